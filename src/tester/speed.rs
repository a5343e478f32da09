//! Throughput probing with a single active route.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, timeout};

use crate::api::{ControlPlane, ThroughputProbe};
use crate::cache::{ExclusionCache, SpeedCache};
use crate::settings::{Settings, SpeedSettings};
use crate::utils::random_alphanumeric;

/// Time allowed on top of the download window before a measurement is abandoned
const WINDOW_GRACE: Duration = Duration::from_secs(5);

pub const SWITCH_FAILED: &str = "switch failed";
pub const SPEED_TEST_FAILED: &str = "speed test failed";

static SPEED_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(_\d+\.\d+MB/s)+$").unwrap());

/// `name` with its throughput suffix replaced by `_<speed>MB/s`.
///
/// ```
/// use subforge::tester::speed_label;
///
/// assert_eq!(speed_label("Tokyo", 3.14159), "Tokyo_3.14MB/s");
/// assert_eq!(speed_label("Tokyo_1.00MB/s_2.50MB/s", 4.0), "Tokyo_4.00MB/s");
/// ```
pub fn speed_label(name: &str, speed: f64) -> String {
    let base = SPEED_SUFFIX.replace(name, "");
    format!("{}_{:.2}MB/s", base, speed)
}

/// Throughput results of one run, in completion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeedReport {
    pub results: Vec<(String, f64)>,
}

impl SpeedReport {
    /// Results at or above `min_speed`, fastest first, at most `limit`.
    pub fn ranked(&self, min_speed: f64, limit: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .results
            .iter()
            .filter(|(_, speed)| *speed >= min_speed)
            .cloned()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(limit);
        ranked
    }

    /// Old name to new name for every name in `names`
    ///
    /// `names` must hold every node name of the configuration. Ranked nodes
    /// get a speed label, every other name maps to itself. The new names are
    /// unique: a label that collides with a kept name or an earlier label gets
    /// a random `-XXXX` tag on its base name.
    pub fn rename_mapping(&self, names: &[String], min_speed: f64, limit: usize) -> HashMap<String, String> {
        let ranked = self.ranked(min_speed, limit);
        let ranked_names: HashSet<&str> = ranked.iter().map(|(name, _)| name.as_str()).collect();

        let mut mapping = HashMap::new();
        let mut taken = HashSet::new();
        for name in names {
            if !ranked_names.contains(name.as_str()) {
                mapping.insert(name.clone(), name.clone());
                taken.insert(name.clone());
            }
        }
        for (i, (name, speed)) in ranked.into_iter().enumerate() {
            let mut label = speed_label(&name, speed);
            while taken.contains(&label) {
                let base = SPEED_SUFFIX.replace(&name, "");
                label = speed_label(&format!("{}-{}", base, random_alphanumeric(4)), speed);
            }
            info!("{}. {}: {:.2}MB/s", i + 1, label, speed);
            taken.insert(label.clone());
            mapping.insert(name, label);
        }
        mapping
    }
}

/// Measures node throughput by switching the selector group to each node
/// and downloading through the engine
///
/// The engine has one active route, so switching and downloading for one
/// node is an exclusive section: at most one node is being measured at any
/// instant, whatever the width of the candidate limiter.
pub struct SpeedTester<'a, C: ControlPlane, T: ThroughputProbe> {
    api: &'a C,
    probe: &'a T,
    exclusions: &'a ExclusionCache,
    speeds: &'a SpeedCache,
    settings: SpeedSettings,
    selector_group: String,
    switch_timeout: Duration,
    limiter: Semaphore,
    route: Mutex<()>,
}

impl<'a, C: ControlPlane, T: ThroughputProbe> SpeedTester<'a, C, T> {
    pub fn new(
        api: &'a C,
        probe: &'a T,
        exclusions: &'a ExclusionCache,
        speeds: &'a SpeedCache,
        settings: &Settings,
    ) -> Self {
        Self {
            api,
            probe,
            exclusions,
            speeds,
            settings: settings.speed.clone(),
            selector_group: settings.api.selector_group.clone(),
            switch_timeout: settings.api.timeout(),
            limiter: Semaphore::new(settings.speed.max_concurrent.max(1)),
            route: Mutex::new(()),
        }
    }

    /// Makes `name` the active route, retrying with a fixed pause.
    async fn switch_to(&self, name: &str) -> bool {
        let attempts = self.settings.retries.max(1);
        for attempt in 1..=attempts {
            match timeout(self.switch_timeout, self.api.switch_route(&self.selector_group, name)).await {
                Ok(Ok(())) => {
                    info!("Switched to node `{}`", name);
                    return true;
                }
                Ok(Err(e)) => warn!("Switching to `{}` failed ({}/{}): {}", name, attempt, attempts, e),
                Err(_) => warn!("Switching to `{}` timed out ({}/{})", name, attempt, attempts),
            }
            if attempt < attempts {
                sleep(self.settings.retry_backoff()).await;
            }
        }
        false
    }

    /// Throughput of `name` in MB/s, zero when it cannot be measured
    ///
    /// A cached measurement younger than 24 hours is returned without any
    /// network activity.
    pub async fn measure(&self, name: &str) -> f64 {
        if let Some(speed) = self.speeds.cached_speed(name) {
            info!("Node `{}` speed (cached): {:.2}MB/s", name, speed);
            return speed;
        }

        let _permit = self.limiter.acquire().await.ok();
        let _route = self.route.lock().await;

        if !self.switch_to(name).await {
            warn!("Skipping speed test of `{}`: switch failed", name);
            self.exclusions.add_excluded(name, SWITCH_FAILED);
            return 0.0;
        }

        let window = self.settings.window();
        let attempts = self.settings.retries.max(1);
        for attempt in 1..=attempts {
            let outcome = timeout(window + WINDOW_GRACE, self.probe.download(window)).await;
            match outcome {
                Ok(Ok(transfer)) => {
                    let speed = transfer.mb_per_sec();
                    self.speeds.record(name, speed);
                    info!("Node `{}` speed: {:.2}MB/s", name, speed);
                    return speed;
                }
                Ok(Err(e)) => warn!("Download through `{}` failed ({}/{}): {}", name, attempt, attempts, e),
                Err(_) => warn!("Download through `{}` stalled ({}/{})", name, attempt, attempts),
            }
            if attempt < attempts {
                sleep(self.settings.retry_backoff()).await;
            }
        }

        self.exclusions.add_excluded(name, SPEED_TEST_FAILED);
        0.0
    }

    /// Measures the names without an active exclusion entry, at most
    /// `speed.limit` of them.
    pub async fn measure_batch(&self, names: &[String]) -> SpeedReport {
        let candidates: Vec<&String> = names
            .iter()
            .filter(|name| !self.exclusions.is_excluded(name))
            .take(self.settings.limit)
            .collect();
        if candidates.is_empty() {
            warn!("All nodes are in the exclusion cache, skipping speed test");
            return SpeedReport::default();
        }

        let mut pending: FuturesUnordered<_> = candidates
            .into_iter()
            .map(|name| async move { (name.clone(), self.measure(name).await) })
            .collect();

        let mut report = SpeedReport::default();
        while let Some(result) = pending.next().await {
            report.results.push(result);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> SpeedReport {
        SpeedReport {
            results: vec![
                ("slow".to_string(), 0.05),
                ("b_1.00MB/s".to_string(), 2.5),
                ("a".to_string(), 7.0),
                ("c".to_string(), 1.0),
            ],
        }
    }

    #[test]
    fn test_ranked_filters_sorts_and_caps() {
        let ranked = report().ranked(0.1, 2);
        assert_eq!(
            ranked,
            vec![("a".to_string(), 7.0), ("b_1.00MB/s".to_string(), 2.5)]
        );
    }

    #[test]
    fn test_rename_mapping() {
        let names: Vec<String> = ["slow", "b_1.00MB/s", "a", "c", "untested"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mapping = report().rename_mapping(&names, 0.1, 10);
        assert_eq!(mapping["a"], "a_7.00MB/s");
        assert_eq!(mapping["b_1.00MB/s"], "b_2.50MB/s");
        assert_eq!(mapping["c"], "c_1.00MB/s");
        assert_eq!(mapping["slow"], "slow");
        assert_eq!(mapping["untested"], "untested");
    }

    #[test]
    fn test_rename_mapping_never_collides() {
        let names: Vec<String> = ["a", "a_2.50MB/s", "b_1.00MB/s", "b_9.00MB/s"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let report = SpeedReport {
            results: vec![
                ("a".to_string(), 2.5),
                ("a_2.50MB/s".to_string(), 0.01),
                ("b_1.00MB/s".to_string(), 4.0),
                ("b_9.00MB/s".to_string(), 4.0),
            ],
        };
        let mapping = report.rename_mapping(&names, 0.1, 10);

        assert_eq!(mapping.len(), names.len());
        let values: HashSet<&String> = mapping.values().collect();
        assert_eq!(values.len(), names.len(), "{:?}", mapping);
        assert_eq!(mapping["a_2.50MB/s"], "a_2.50MB/s");
        assert!(mapping["a"].starts_with("a-"), "{}", mapping["a"]);
        assert!(mapping["a"].ends_with("_2.50MB/s"));
        let b_labels = [&mapping["b_1.00MB/s"], &mapping["b_9.00MB/s"]];
        assert!(b_labels.contains(&&"b_4.00MB/s".to_string()));
        assert!(b_labels.iter().all(|label| label.starts_with("b") && label.ends_with("_4.00MB/s")));
    }

    #[test]
    fn test_label_is_idempotent() {
        let once = speed_label("node", 1.5);
        assert_eq!(speed_label(&once, 1.5), once);
        // a name that merely ends in digits keeps them
        assert_eq!(speed_label("node_12", 1.0), "node_12_1.00MB/s");
    }
}
