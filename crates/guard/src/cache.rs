//! Key/value cache with expiry

use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Minimal key/value contract the guards rely on.
///
/// `incr` must be atomic: concurrent callers each observe a distinct value.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store `value`, replacing any previous value and expiry
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Increment an integer counter, creating it at 1. Keeps the current expiry.
    async fn incr(&self, key: &str) -> Result<i64, CacheError>;

    /// Set a key's expiry. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remaining time to live, `None` if missing or without expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Expired entries are swept on write at most this often
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: Instant,
}

impl Entries {
    /// Drop every expired entry once the sweep interval has elapsed
    fn sweep(&mut self, now: Instant) {
        if now < self.next_sweep {
            return;
        }
        self.map.retain(|_, entry| entry.is_live(now));
        self.next_sweep = now + SWEEP_INTERVAL;
    }
}

/// In-process [`CacheStore`] on tokio's clock
///
/// Expired keys are evicted when read and swept periodically on write, so
/// keys that are never read again do not accumulate.
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Live entry for `key`; expired entries are evicted on access
    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Entry> {
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries().map.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries held, expired or not
    pub fn stored(&self) -> usize {
        self.entries().map.len()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries();
        Ok(Self::live(&mut entries.map, key, Instant::now()).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries();
        let now = Instant::now();
        entries.sweep(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(now + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, CacheError> {
        let mut entries = self.entries();
        let now = Instant::now();
        entries.sweep(now);

        match Self::live(&mut entries.map, key, now) {
            Some(entry) => {
                let current: i64 = entry
                    .value
                    .parse()
                    .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
                let next = current + 1;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                entries.map.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: None,
                    },
                );
                Ok(1)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let mut entries = self.entries();
        let now = Instant::now();
        match Self::live(&mut entries.map, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let mut entries = self.entries();
        let now = Instant::now();
        Ok(Self::live(&mut entries.map, key, now)
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now)))
    }
}
