//! Persistent key to entry stores with a time-to-live policy.
//!
//! Both stores are flat JSON objects keyed by node name. Entries carry the
//! local wall-clock time they were written at (ISO 8601 without offset);
//! an entry older than the store's TTL reads as absent but stays on disk
//! until it is overwritten.
//!
//! Loading never fails: a missing or corrupt file yields an empty store.
//! A store that was modified is written back when it is dropped, unless
//! [`TtlCache::save`] already flushed it.

pub mod exclusion;
pub mod speed;

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Local, NaiveDateTime};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::utils::file::{file_exists, file_get, file_write};

pub use exclusion::{ExclusionCache, ExclusionEntry};
pub use speed::{SpeedCache, SpeedEntry};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current local time, the clock all cache timestamps use.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// A value stored in a [`TtlCache`].
pub trait CacheEntry: Serialize + DeserializeOwned + Clone {
    fn timestamp(&self) -> NaiveDateTime;
}

pub struct TtlCache<E: CacheEntry> {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: Mutex<HashMap<String, E>>,
    dirty: AtomicBool,
}

impl<E: CacheEntry> TtlCache<E> {
    /// Store that lives only in memory and is never persisted.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            path: None,
            ttl,
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Loads the store at `path`, starting empty if it is missing or unreadable.
    pub fn load(path: impl AsRef<Path>, ttl: Duration) -> Self {
        let path = path.as_ref();
        let entries = if file_exists(path) {
            match Self::read_entries(path) {
                Ok(entries) => {
                    debug!("Loaded {} cache entries from {}", entries.len(), path.display());
                    entries
                }
                Err(e) => {
                    warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        Self {
            path: Some(path.to_path_buf()),
            ttl,
            entries: Mutex::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    fn read_entries(path: &Path) -> Result<HashMap<String, E>, CacheError> {
        let content = file_get(path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, E>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The entry for `key` if it was written less than one TTL before `now`.
    pub fn get_at(&self, key: &str, now: NaiveDateTime) -> Option<E> {
        self.lock()
            .get(key)
            .filter(|entry| now.signed_duration_since(entry.timestamp()) < self.ttl)
            .cloned()
    }

    pub fn get(&self, key: &str) -> Option<E> {
        self.get_at(key, now())
    }

    /// Inserts or overwrites the entry for `key`.
    pub fn insert(&self, key: impl Into<String>, entry: E) {
        self.lock().insert(key.into(), entry);
        self.dirty.store(true, Ordering::Release);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the whole store back to its file, keys in sorted order.
    pub fn save(&self) -> Result<(), CacheError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let json = {
            let entries = self.lock();
            let sorted: BTreeMap<&String, &E> = entries.iter().collect();
            serde_json::to_string_pretty(&sorted)?
        };
        file_write(path, json.as_bytes())?;
        self.dirty.store(false, Ordering::Release);
        debug!("Saved cache {}", path.display());
        Ok(())
    }
}

impl<E: CacheEntry> Drop for TtlCache<E> {
    fn drop(&mut self) {
        if self.dirty.load(Ordering::Acquire) {
            if let Err(e) = self.save() {
                error!("Failed to flush cache: {}", e);
            }
        }
    }
}
