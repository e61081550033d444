//! Time-bounded response cache.
//!
//! Entries carry a fixed TTL stamped at insertion. There is no janitor task:
//! an expired entry is dropped by the first `get` that trips over it.

mod key;

pub use key::cache_key;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock, shift};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Written as `ttl_secs`; fractional seconds are kept.
    #[serde(rename = "ttl_secs", with = "crate::clock::duration_secs")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL }
    }
}

impl CacheConfig {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Effective TTL; only a zero TTL falls back to [`DEFAULT_TTL`].
    pub fn effective_ttl(&self) -> Duration {
        if self.ttl.is_zero() {
            DEFAULT_TTL
        } else {
            self.ttl
        }
    }
}

/// Cache statistics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Misses caused by an entry that had outlived its TTL.
    pub expired: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Miss,
}

pub struct ResponseCache<V> {
    ttl: Duration,
    items: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: config.effective_ttl(),
            items: DashMap::new(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns a clone of the live value for `key`.
    ///
    /// An expired entry reads as a miss and is removed on the way out. The
    /// empty key always misses.
    pub fn get(&self, key: &str) -> Option<V> {
        if key.is_empty() {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let now = self.clock.now();
        let lookup = match self.items.get(key) {
            None => Lookup::Miss,
            Some(entry) if entry.is_live(now) => Lookup::Hit(entry.value.clone()),
            Some(_) => Lookup::Expired,
        };

        match lookup {
            Lookup::Hit(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Lookup::Expired => {
                // Re-checked under the shard write lock: a concurrent `set`
                // may already have replaced the stale entry.
                self.items.remove_if(key, |_, entry| !entry.is_live(now));
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Lookup::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores `value` until `now + ttl`, replacing any previous entry and its
    /// expiry. The empty key is ignored.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if key.is_empty() {
            tracing::debug!("Ignoring cache write for empty key");
            return;
        }
        let expires_at = shift(self.clock.now(), self.ttl);
        self.items.insert(key, CacheEntry { value, expires_at });
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.items.remove(key).map(|(_, entry)| entry.value)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("entries", &self.items.len())
            .finish()
    }
}
