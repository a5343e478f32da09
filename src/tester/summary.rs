use log::info;

use crate::models::{DelayPhase, ProxyTestResult};

/// Per-node line of a phase summary.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedNode {
    pub name: String,
    pub average_delay: f64,
    pub std_dev: f64,
    /// Percentage, 0 to 100
    pub success_rate: f64,
}

/// Aggregate view of one probing phase
///
/// The averages are taken over valid results only and are zero when there
/// are none.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSummary {
    pub phase: DelayPhase,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub average_delay: f64,
    pub average_std_dev: f64,
    pub average_success_rate: f64,
    /// Valid nodes, lowest average delay first
    pub ranked: Vec<RankedNode>,
}

fn mean(results: &[&ProxyTestResult], f: impl Fn(&ProxyTestResult) -> f64) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| f(r)).sum::<f64>() / results.len() as f64
}

impl PhaseSummary {
    pub fn new(phase: DelayPhase, results: &[ProxyTestResult], limit: usize) -> Self {
        let mut valid: Vec<&ProxyTestResult> = results.iter().filter(|r| r.is_valid()).collect();
        valid.sort_by(|a, b| a.average_delay().total_cmp(&b.average_delay()));

        let count = valid.len();
        Self {
            phase,
            total: results.len(),
            valid: count,
            invalid: results.len() - count,
            average_delay: mean(&valid, ProxyTestResult::average_delay),
            average_std_dev: mean(&valid, ProxyTestResult::std_dev),
            average_success_rate: mean(&valid, |r| r.success_rate() * 100.0),
            ranked: valid
                .iter()
                .take(limit)
                .map(|r| RankedNode {
                    name: r.name.clone(),
                    average_delay: r.average_delay(),
                    std_dev: r.std_dev(),
                    success_rate: r.success_rate() * 100.0,
                })
                .collect(),
        }
    }

    /// Names of the valid nodes in ascending delay order.
    pub fn valid_names(&self) -> Vec<String> {
        self.ranked.iter().map(|r| r.name.clone()).collect()
    }

    pub fn log(&self, group: &str) {
        info!("Group '{}' {} test results:", group, self.phase);
        info!("Total nodes: {}", self.total);
        info!("Valid nodes: {}", self.valid);
        info!("Invalid nodes: {}", self.invalid);
        if self.valid == 0 {
            return;
        }
        info!("Average delay: {:.2}ms", self.average_delay);
        info!("Average std-dev: {:.2}ms", self.average_std_dev);
        info!("Average success rate: {:.2}%", self.average_success_rate);
        for (i, node) in self.ranked.iter().enumerate() {
            info!(
                "{}. {}: avg {:.2}ms, std-dev {:.2}ms, success {:.2}%",
                i + 1,
                node.name,
                node.average_delay,
                node.std_dev,
                node.success_rate
            );
        }
    }
}
