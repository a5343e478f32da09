use serde::{Deserialize, Serialize};

/// Response of `GET /version`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub meta: bool,
}

/// Response of `GET /proxies/{name}/delay`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayResponse {
    pub delay: u32,
}

/// Body of `PUT /proxies/{group}`
#[derive(Debug, Clone, Serialize)]
pub struct SwitchRequest<'a> {
    pub name: &'a str,
}
