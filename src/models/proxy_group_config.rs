use serde::{Deserialize, Serialize};

/// Type of proxy group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyGroupType {
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "url-test")]
    URLTest,
    #[serde(rename = "fallback")]
    Fallback,
    #[serde(rename = "load-balance")]
    LoadBalance,
    #[serde(rename = "relay")]
    Relay,
}

impl ProxyGroupType {
    /// Get string representation of the proxy group type
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyGroupType::Select => "select",
            ProxyGroupType::URLTest => "url-test",
            ProxyGroupType::Fallback => "fallback",
            ProxyGroupType::LoadBalance => "load-balance",
            ProxyGroupType::Relay => "relay",
        }
    }
}

/// A proxy group of the Clash configuration.
///
/// Only the member list is interpreted; every other key (`url`, `interval`,
/// `exclude-filter`, ...) is carried through `extra` unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub group_type: ProxyGroupType,
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl ProxyGroup {
    pub fn new(name: impl Into<String>, group_type: ProxyGroupType) -> Self {
        Self {
            name: name.into(),
            group_type,
            proxies: Vec::new(),
            extra: serde_yaml::Mapping::new(),
        }
    }

    /// Drops repeated references, keeping the first occurrence.
    pub fn dedup_proxies(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.proxies.retain(|name| seen.insert(name.clone()));
    }
}
