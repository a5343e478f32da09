use std::time::Duration;

use log::debug;
use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use tokio::time::{timeout, Instant};

use super::error::{ApiError, ApiResult};
use super::{ThroughputProbe, Transfer};
use crate::utils::http::build_client;

/// Time allowed on top of the download window before the client gives up
const CLIENT_GRACE: Duration = Duration::from_secs(5);

/// Downloads a large payload through the engine's local HTTP proxy
#[derive(Debug, Clone)]
pub struct HttpThroughputProbe {
    client: Client,
    url: String,
}

impl HttpThroughputProbe {
    /// # Arguments
    /// * `url` - Payload to download, larger than one window can transfer
    /// * `proxy` - Local forwarding endpoint, e.g. "http://127.0.0.1:7890"
    /// * `window` - Longest download window that will be requested
    pub fn new(url: impl Into<String>, proxy: &str, window: Duration) -> ApiResult<Self> {
        Ok(Self {
            client: build_client(window + CLIENT_GRACE, Some(proxy))?,
            url: url.into(),
        })
    }
}

impl ThroughputProbe for HttpThroughputProbe {
    async fn download(&self, window: Duration) -> ApiResult<Transfer> {
        let start = Instant::now();
        let mut response = timeout(
            window,
            self.client
                .get(&self.url)
                .header(CACHE_CONTROL, "no-cache")
                .send(),
        )
        .await
        .map_err(|_| ApiError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::status(status.as_u16(), ""));
        }

        let mut bytes: u64 = 0;
        loop {
            let remaining = window.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, response.chunk()).await {
                Ok(Ok(Some(chunk))) => bytes += chunk.len() as u64,
                Ok(Ok(None)) => break,
                // A stall or reset after data arrived still measured something
                Ok(Err(e)) if bytes > 0 => {
                    debug!("Download interrupted after {} bytes: {}", bytes, e);
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if bytes > 0 => break,
                Err(_) => return Err(ApiError::Timeout),
            }
        }

        Ok(Transfer {
            bytes,
            elapsed: start.elapsed(),
        })
    }
}
