use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{now, CacheEntry, CacheError, TtlCache};

/// Why and when a node was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub reason: String,
    pub timestamp: NaiveDateTime,
}

impl CacheEntry for ExclusionEntry {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Names rejected during the last seven days
///
/// An active entry lets later runs skip the node without touching the network.
pub struct ExclusionCache {
    inner: TtlCache<ExclusionEntry>,
}

impl ExclusionCache {
    pub fn ttl() -> Duration {
        Duration::days(7)
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        Self {
            inner: TtlCache::load(path, Self::ttl()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            inner: TtlCache::in_memory(Self::ttl()),
        }
    }

    pub fn is_excluded_at(&self, name: &str, now: NaiveDateTime) -> bool {
        self.inner.get_at(name, now).is_some()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.is_excluded_at(name, now())
    }

    /// Stores `reason` for `name` with timestamp `at`, replacing any earlier entry.
    pub fn add_excluded_at(&self, name: &str, reason: &str, at: NaiveDateTime) {
        self.inner.insert(
            name,
            ExclusionEntry {
                reason: reason.to_string(),
                timestamp: at,
            },
        );
    }

    pub fn add_excluded(&self, name: &str, reason: &str) {
        self.add_excluded_at(name, reason, now())
    }

    /// Reason of the active entry for `name`.
    pub fn reason(&self, name: &str) -> Option<String> {
        self.inner.get(name).map(|entry| entry.reason)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn save(&self) -> Result<(), CacheError> {
        self.inner.save()
    }
}
