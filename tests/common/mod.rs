#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use subforge::api::{ApiError, ApiResult, ControlPlane, ThroughputProbe, Transfer};
use subforge::cache::{ExclusionCache, SpeedCache};
use subforge::Settings;
use tokio::time::sleep;

pub const MIB: u64 = 1024 * 1024;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn memory_caches() -> (ExclusionCache, SpeedCache) {
    (ExclusionCache::in_memory(), SpeedCache::in_memory())
}

/// Settings with the network-facing parts pointed at nothing.
pub fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.speed.proxy = "http://127.0.0.1:1".to_string();
    settings
}

fn bump_max(current: &AtomicUsize, max: &AtomicUsize) {
    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
    max.fetch_max(now, Ordering::SeqCst);
}

/// In-memory control plane
///
/// Nodes with a configured delay answer every sample after sleeping that
/// long; every other node fails. The active route is shared with
/// [`FakeThroughput`] so downloads can see which node they go through.
#[derive(Default)]
pub struct FakeControlPlane {
    delays: HashMap<String, u32>,
    failing_targets: HashSet<(String, String)>,
    failing_switches: HashSet<String>,
    route: Arc<Mutex<Option<String>>>,
    pub delay_calls: AtomicUsize,
    pub switch_calls: AtomicUsize,
    delays_in_flight: AtomicUsize,
    pub max_delays_in_flight: AtomicUsize,
    switches: Mutex<Vec<(String, String)>>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, node: &str, delay: u32) -> Self {
        self.delays.insert(node.to_string(), delay);
        self
    }

    /// `node` fails every sample against `url`.
    pub fn failing_target(mut self, node: &str, url: &str) -> Self {
        self.failing_targets.insert((node.to_string(), url.to_string()));
        self
    }

    pub fn failing_switch(mut self, node: &str) -> Self {
        self.failing_switches.insert(node.to_string());
        self
    }

    pub fn route(&self) -> Arc<Mutex<Option<String>>> {
        self.route.clone()
    }

    pub fn active_route(&self) -> Option<String> {
        self.route.lock().unwrap().clone()
    }

    pub fn switches(&self) -> Vec<(String, String)> {
        self.switches.lock().unwrap().clone()
    }

    pub fn delay_calls(&self) -> usize {
        self.delay_calls.load(Ordering::SeqCst)
    }

    pub fn switch_calls(&self) -> usize {
        self.switch_calls.load(Ordering::SeqCst)
    }
}

impl ControlPlane for FakeControlPlane {
    async fn version(&self) -> ApiResult<String> {
        Ok("fake".to_string())
    }

    async fn switch_route(&self, group: &str, node: &str) -> ApiResult<()> {
        self.switch_calls.fetch_add(1, Ordering::SeqCst);
        sleep(Duration::from_millis(5)).await;
        if self.failing_switches.contains(node) {
            return Err(ApiError::status(404, "proxy not found"));
        }
        self.switches
            .lock()
            .unwrap()
            .push((group.to_string(), node.to_string()));
        *self.route.lock().unwrap() = Some(node.to_string());
        Ok(())
    }

    async fn delay(&self, node: &str, url: &str, _timeout: Duration) -> ApiResult<u32> {
        self.delay_calls.fetch_add(1, Ordering::SeqCst);
        bump_max(&self.delays_in_flight, &self.max_delays_in_flight);
        let delay = self.delays.get(node).copied();
        sleep(Duration::from_millis(u64::from(delay.unwrap_or(100)))).await;
        self.delays_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_targets.contains(&(node.to_string(), url.to_string())) {
            return Err(ApiError::Timeout);
        }
        delay.ok_or_else(|| ApiError::status(503, "An error occurred in the delay test"))
    }
}

/// In-memory throughput probe that reports, per active route, a fixed
/// number of bytes over the whole window.
pub struct FakeThroughput {
    route: Arc<Mutex<Option<String>>>,
    bytes: HashMap<String, u64>,
    failures: Mutex<HashMap<String, usize>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub cross_attributed: AtomicBool,
    measured: Mutex<Vec<String>>,
}

impl FakeThroughput {
    pub fn new(api: &FakeControlPlane) -> Self {
        Self {
            route: api.route(),
            bytes: HashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            cross_attributed: AtomicBool::new(false),
            measured: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bytes(mut self, node: &str, bytes: u64) -> Self {
        self.bytes.insert(node.to_string(), bytes);
        self
    }

    /// The next `times` downloads through `node` fail.
    pub fn failing(self, node: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(node.to_string(), times);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn cross_attributed(&self) -> bool {
        self.cross_attributed.load(Ordering::SeqCst)
    }

    /// Active route seen by each download, in order.
    pub fn measured(&self) -> Vec<String> {
        self.measured.lock().unwrap().clone()
    }

    fn active(&self) -> Option<String> {
        self.route.lock().unwrap().clone()
    }
}

impl ThroughputProbe for FakeThroughput {
    async fn download(&self, window: Duration) -> ApiResult<Transfer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        bump_max(&self.in_flight, &self.max_in_flight);
        let before = self.active();
        sleep(window).await;
        let after = self.active();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if before != after {
            self.cross_attributed.store(true, Ordering::SeqCst);
        }
        let node = after.unwrap_or_default();
        self.measured.lock().unwrap().push(node.clone());

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(&node) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ApiError::Timeout);
                }
            }
        }
        Ok(Transfer {
            bytes: self.bytes.get(&node).copied().unwrap_or(0),
            elapsed: window,
        })
    }
}
