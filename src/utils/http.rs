use std::time::Duration;

use reqwest::{Client, Proxy};

/// User agent sent to subscription hosts and speed test servers
pub const USER_AGENT: &str = "clash-verge/v1.7.7";

/// Builds an HTTP client with a per-request timeout and an optional upstream proxy.
///
/// # Arguments
/// * `timeout` - Total time allowed for one request
/// * `proxy` - Optional proxy URL (e.g., "http://127.0.0.1:7890"); empty means none
pub fn build_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .danger_accept_invalid_certs(true);

    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        builder = builder.proxy(Proxy::all(proxy)?);
    } else {
        builder = builder.no_proxy();
    }

    builder.build()
}
