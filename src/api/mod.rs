//! Clients of the running proxy engine.
//!
//! [`ControlPlane`] covers the management API (liveness, route selection,
//! per-node delay); [`ThroughputProbe`] covers downloads through the engine's
//! local forwarding endpoint. The engines in [`crate::tester`] only see these
//! traits, so tests drive them with in-memory fakes.

pub mod clash;
pub mod error;
pub mod throughput;
pub mod types;

use std::future::Future;
use std::time::Duration;

pub use clash::ClashApi;
pub use error::{ApiError, ApiResult};
pub use throughput::HttpThroughputProbe;
pub use types::{DelayResponse, SwitchRequest, VersionResponse};

pub trait ControlPlane {
    /// `GET /version`, the liveness check.
    fn version(&self) -> impl Future<Output = ApiResult<String>>;

    /// `PUT /proxies/{group}`: make `node` the group's active route.
    fn switch_route(&self, group: &str, node: &str) -> impl Future<Output = ApiResult<()>>;

    /// `GET /proxies/{node}/delay`: one delay sample in milliseconds.
    fn delay(&self, node: &str, url: &str, timeout: Duration) -> impl Future<Output = ApiResult<u32>>;
}

/// Bytes received during one download window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Transfer {
    /// Throughput in MB/s (1 MB = 1024 * 1024 bytes); zero for an empty window.
    pub fn mb_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs / (1024.0 * 1024.0)
    }
}

pub trait ThroughputProbe {
    /// Streams the test payload through the currently active route for at
    /// most `window`.
    fn download(&self, window: Duration) -> impl Future<Output = ApiResult<Transfer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_rate() {
        let transfer = Transfer {
            bytes: 20 * 1024 * 1024,
            elapsed: Duration::from_secs(10),
        };
        assert!((transfer.mb_per_sec() - 2.0).abs() < 1e-9);
        let empty = Transfer {
            bytes: 10,
            elapsed: Duration::ZERO,
        };
        assert_eq!(empty.mb_per_sec(), 0.0);
    }
}
