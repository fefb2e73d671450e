//! Bounded in-memory tier with LRU eviction and optional TTL.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::cache::store::CachedResult;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: CachedResult,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// LRU map from query to cached result.
///
/// The lock is only held for synchronous map operations.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<LruCache<String, MemoryEntry>>,
    ttl: Option<Duration>,
}

impl MemoryStore {
    /// `ttl = None` never expires entries; capacity is at least one.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, MemoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `key`, refreshing its recency. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<CachedResult> {
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired(Instant::now());
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: String, value: CachedResult) {
        let expires_at = self.ttl.map(|ttl| Instant::now() + ttl);
        self.lock().put(key, MemoryEntry { value, expires_at });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
