//! Multi-sample delay probing through the control plane.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout, Instant};

use crate::api::ControlPlane;
use crate::cache::ExclusionCache;
use crate::models::{DelayPhase, ProxyTestResult};
use crate::settings::HealthSettings;

/// Time allowed on top of the engine-side timeout before a sample is abandoned
const SAMPLE_SLACK: Duration = Duration::from_secs(1);

/// Probes nodes for delay and stability
///
/// Each probe draws `samples` delay measurements spaced by `interval`. All
/// probes of all batches share one limiter of `max_concurrent` permits.
/// Results are remembered per node and phase for `result_ttl`.
pub struct HealthTester<'a, C: ControlPlane> {
    api: &'a C,
    exclusions: &'a ExclusionCache,
    settings: HealthSettings,
    limiter: Semaphore,
    results: Mutex<HashMap<(String, DelayPhase), (Instant, ProxyTestResult)>>,
}

impl<'a, C: ControlPlane> HealthTester<'a, C> {
    pub fn new(api: &'a C, exclusions: &'a ExclusionCache, settings: &HealthSettings) -> Self {
        Self {
            api,
            exclusions,
            settings: settings.clone(),
            limiter: Semaphore::new(settings.max_concurrent.max(1)),
            results: Mutex::new(HashMap::new()),
        }
    }

    pub fn target_url(&self, phase: DelayPhase) -> &str {
        match phase {
            DelayPhase::Primary => &self.settings.primary_url,
            DelayPhase::Secondary => &self.settings.secondary_url,
        }
    }

    fn cached(&self, name: &str, phase: DelayPhase) -> Option<ProxyTestResult> {
        let results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        results
            .get(&(name.to_string(), phase))
            .filter(|(tested_at, _)| tested_at.elapsed() < self.settings.result_ttl())
            .map(|(_, result)| result.clone())
    }

    fn remember(&self, phase: DelayPhase, result: &ProxyTestResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((result.name.clone(), phase), (Instant::now(), result.clone()));
    }

    /// One delay sample in milliseconds, `None` on any failure.
    async fn sample(&self, name: &str, url: &str) -> Option<f64> {
        let per_call = self.settings.timeout();
        match timeout(per_call + SAMPLE_SLACK, self.api.delay(name, url, per_call)).await {
            Ok(Ok(delay)) => Some(f64::from(delay)),
            Ok(Err(e)) => {
                debug!("Delay sample of `{}` failed: {}", name, e);
                None
            }
            Err(_) => {
                debug!("Delay sample of `{}` timed out", name);
                None
            }
        }
    }

    /// Probes `name` against the target of `phase`
    ///
    /// Names with an active exclusion entry get an invalid result without any
    /// network call. A failed sample records an exclusion tagged with the
    /// phase; sampling continues for the remaining slots.
    pub async fn probe(&self, name: &str, phase: DelayPhase) -> ProxyTestResult {
        if self.exclusions.is_excluded(name) {
            info!("Node `{}` is in the exclusion cache, skipping", name);
            return ProxyTestResult::failed(name);
        }
        if let Some(result) = self.cached(name, phase) {
            return result;
        }

        let _permit = self.limiter.acquire().await.ok();
        let url = self.target_url(phase).to_string();
        let count = self.settings.samples.max(1);
        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let sample = self.sample(name, &url).await;
            if sample.is_none() {
                self.exclusions.add_excluded(name, phase.failure_reason());
            }
            samples.push(sample);
            if i + 1 < count {
                sleep(self.settings.interval()).await;
            }
        }

        let result = ProxyTestResult::new(name, samples);
        self.remember(phase, &result);
        result
    }

    /// Probes every distinct name, results in completion order.
    pub async fn probe_batch(&self, names: &[String], phase: DelayPhase) -> Vec<ProxyTestResult> {
        let mut seen = HashSet::new();
        let mut pending: FuturesUnordered<_> = names
            .iter()
            .filter(|name| seen.insert(*name))
            .map(|name| self.probe(name, phase))
            .collect();

        let total = pending.len();
        info!(
            "Starting {} test of {} nodes (max concurrency: {})",
            phase, total, self.settings.max_concurrent
        );
        let mut results = Vec::with_capacity(total);
        while let Some(result) = pending.next().await {
            results.push(result);
            debug!(
                "{} test progress: {}/{} ({:.1}%)",
                phase,
                results.len(),
                total,
                results.len() as f64 / total as f64 * 100.0
            );
        }
        results
    }
}
