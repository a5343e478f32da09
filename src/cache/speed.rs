use std::path::Path;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{now, CacheEntry, CacheError, TtlCache};

/// Last measured throughput of a node in MB/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedEntry {
    pub speed: f64,
    pub timestamp: NaiveDateTime,
}

impl CacheEntry for SpeedEntry {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Throughput measurements that are reused for 24 hours.
pub struct SpeedCache {
    inner: TtlCache<SpeedEntry>,
}

impl SpeedCache {
    pub fn ttl() -> Duration {
        Duration::hours(24)
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

    pub fn cached_speed_at(&self, name: &str, now: NaiveDateTime) -> Option<f64> {
        self.inner.get_at(name, now).map(|entry| entry.speed)
    }

    pub fn cached_speed(&self, name: &str) -> Option<f64> {
        self.cached_speed_at(name, now())
    }

    pub fn record_at(&self, name: &str, speed: f64, at: NaiveDateTime) {
        self.inner.insert(name, SpeedEntry { speed, timestamp: at });
    }

    pub fn record(&self, name: &str, speed: f64) {
        self.record_at(name, speed, now())
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_ttl() {
        let cache = SpeedCache::in_memory();
        let t = now();
        cache.record_at("n", 4.25, t);
        assert_eq!(cache.cached_speed_at("n", t + Duration::hours(23)), Some(4.25));
        assert_eq!(cache.cached_speed_at("n", t + Duration::hours(25)), None);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speed_cache.json");
        {
            let cache = SpeedCache::load(&path);
            cache.record("n", 1.5);
        }
        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["n"]["speed"], 1.5);
        assert!(json["n"]["timestamp"].is_string());
    }
}
