use std::time::Duration;

use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use super::error::{ApiError, ApiResult};
use super::types::{DelayResponse, SwitchRequest, VersionResponse};
use super::ControlPlane;
use crate::utils::http::build_client;

/// Extra time granted to the HTTP request over the delay the engine measures
const DELAY_REQUEST_SLACK: Duration = Duration::from_secs(1);

/// Client of the Clash (mihomo) external controller
#[derive(Debug, Clone)]
pub struct ClashApi {
    client: Client,
    base_url: Url,
    secret: Option<String>,
}

impl ClashApi {
    /// Creates a client for `http://{host}:{port}` without contacting it.
    ///
    /// # Arguments
    /// * `host` - Controller host, e.g. "127.0.0.1"
    /// * `port` - Controller port
    /// * `secret` - Bearer token; empty means none
    /// * `timeout` - Per-request timeout
    pub fn new(host: &str, port: u16, secret: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = Url::parse(&format!("http://{}:{}/", host, port))?;
        let client = build_client(timeout, None)?;
        Ok(Self {
            client,
            base_url,
            secret: Some(secret.to_string()).filter(|s| !s.is_empty()),
        })
    }

    /// Tries each port in order and returns a client for the first one whose
    /// `/version` answers.
    pub async fn connect(host: &str, ports: &[u16], secret: &str, timeout: Duration) -> ApiResult<Self> {
        for &port in ports {
            let api = Self::new(host, port, secret, timeout)?;
            match api.version().await {
                Ok(version) => {
                    info!("Connected to Clash API at {} (version {})", api.base_url, version);
                    return Ok(api);
                }
                Err(e) => warn!("Clash API port {} unreachable: {}", port, e),
            }
        }
        Err(ApiError::Unavailable {
            host: host.to_string(),
            ports: ports.to_vec(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each one percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.secret {
            Some(secret) => request.bearer_auth(secret),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::status(status.as_u16(), body));
        }
        Ok(response)
    }
}

impl ControlPlane for ClashApi {
    async fn version(&self) -> ApiResult<String> {
        let url = self.endpoint(&["version"])?;
        let response = self.send(self.client.get(url)).await?;
        let version: VersionResponse = response.json().await?;
        Ok(version.version)
    }

    async fn switch_route(&self, group: &str, node: &str) -> ApiResult<()> {
        let url = self.endpoint(&["proxies", group])?;
        self.send(self.client.put(url).json(&SwitchRequest { name: node }))
            .await?;
        debug!("Switched group `{}` to `{}`", group, node);
        Ok(())
    }

    async fn delay(&self, node: &str, test_url: &str, timeout: Duration) -> ApiResult<u32> {
        let mut url = self.endpoint(&["proxies", node, "delay"])?;
        url.query_pairs_mut()
            .append_pair("url", test_url)
            .append_pair("timeout", &timeout.as_millis().to_string());
        let request = self.client.get(url).timeout(timeout + DELAY_REQUEST_SLACK);
        let response = self.send(request).await?;
        let delay: DelayResponse = response.json().await?;
        Ok(delay.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_names() {
        let api = ClashApi::new("127.0.0.1", 9090, "", Duration::from_secs(3)).unwrap();
        let url = api.endpoint(&["proxies", "节点选择"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9090/proxies/%E8%8A%82%E7%82%B9%E9%80%89%E6%8B%A9");

        let url = api.endpoint(&["proxies", "a/b c_1.00MB/s", "delay"]).unwrap();
        assert_eq!(url.path(), "/proxies/a%2Fb%20c_1.00MB%2Fs/delay");
    }

    #[test]
    fn test_secret_is_optional() {
        let api = ClashApi::new("localhost", 9097, "", Duration::from_secs(3)).unwrap();
        assert!(api.secret.is_none());
        let api = ClashApi::new("localhost", 9097, "s3cret", Duration::from_secs(3)).unwrap();
        assert_eq!(api.secret.as_deref(), Some("s3cret"));
        assert_eq!(api.base_url().as_str(), "http://localhost:9097/");
    }
}
