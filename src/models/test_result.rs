//! Delay probing results and their statistics.

use std::fmt;

/// Minimum fraction of successful samples for a node to be usable.
pub const MIN_SUCCESS_RATE: f64 = 0.8;
/// Maximum sample standard deviation in milliseconds.
pub const MAX_STD_DEV: f64 = 200.0;

/// One full probing pass against a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayPhase {
    Primary,
    Secondary,
}

impl DelayPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            DelayPhase::Primary => "Primary",
            DelayPhase::Secondary => "Secondary",
        }
    }

    /// Exclusion reason recorded when a sample of this phase fails.
    pub fn failure_reason(self) -> &'static str {
        match self {
            DelayPhase::Primary => "Primary test failed",
            DelayPhase::Secondary => "Secondary test failed",
        }
    }
}

impl fmt::Display for DelayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered delay samples of one node; `None` marks a failed sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyTestResult {
    pub name: String,
    pub samples: Vec<Option<f64>>,
}

impl ProxyTestResult {
    pub fn new(name: impl Into<String>, samples: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            samples,
        }
    }

    /// A result that can never be valid, used for short-circuited nodes.
    pub fn failed(name: impl Into<String>) -> Self {
        Self::new(name, vec![None])
    }

    fn successes(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().filter_map(|s| *s)
    }

    pub fn success_rate(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.successes().count() as f64 / self.samples.len() as f64
    }

    /// Mean of the successful samples, `+inf` when there are none.
    pub fn average_delay(&self) -> f64 {
        let count = self.successes().count();
        if count == 0 {
            return f64::INFINITY;
        }
        self.successes().sum::<f64>() / count as f64
    }

    /// Sample standard deviation of the successful samples (0 for one or none).
    pub fn std_dev(&self) -> f64 {
        let count = self.successes().count();
        if count <= 1 {
            return 0.0;
        }
        let mean = self.average_delay();
        let variance = self
            .successes()
            .map(|d| (d - mean).powi(2))
            .sum::<f64>()
            / (count - 1) as f64;
        variance.sqrt()
    }

    pub fn is_valid(&self) -> bool {
        self.success_rate() >= MIN_SUCCESS_RATE
            && self.std_dev() <= MAX_STD_DEV
            && self.average_delay().is_finite()
    }
}
