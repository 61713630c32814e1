//! Bounded least-recently-used cache.
//!
//! Every expensive lookup in the pipeline (repository roots, commit subjects,
//! pull-request info, per-file last commits, current-user identities and
//! per-line blame results) is memoised in its own `LruCache` instance.
//!
//! - Eviction is purely capacity driven, there is no time-based expiry
//! - Recency moves only on `get`/`set` of an existing key; `has` does not touch it
//! - The limit never drops below 1
//!
//! The cache itself does no locking. Owners that share it across tasks wrap it
//! in a `Mutex` (see `SharedLru`).

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default capacity for every pipeline cache.
pub const DEFAULT_CACHE_SIZE: usize = 100;

pub struct LruCache<K: Hash + Eq, V> {
    inner: lru::LruCache<K, V>,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: lru::LruCache::new(clamp_limit(limit)),
        }
    }

    /// Look up a key, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.inner.get(key)
    }

    /// Insert or replace a key as most recently used, evicting the least
    /// recently used entry when the limit is exceeded.
    pub fn set(&mut self, key: K, value: V) {
        self.inner.put(key, value);
    }

    pub fn has(&self, key: &K) -> bool {
        self.inner.contains(key)
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.inner.pop(key).is_some()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Change the capacity, evicting least recently used entries until the
    /// cache fits.
    pub fn set_limit(&mut self, limit: usize) {
        self.inner.resize(clamp_limit(limit));
    }

    pub fn limit(&self) -> usize {
        self.inner.cap().get()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn clamp_limit(limit: usize) -> NonZeroUsize {
    NonZeroUsize::new(limit).unwrap_or(NonZeroUsize::MIN)
}

/// An `LruCache` behind a mutex, for caches owned by a component that is
/// itself shared between tasks.
pub struct SharedLru<K: Hash + Eq, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq, V: Clone> SharedLru<K, V> {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(limit)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: K, value: V) {
        self.lock().set(key, value);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn set_limit(&self, limit: usize) {
        self.lock().set_limit(limit);
    }

    // Cache contents stay consistent even if a holder panicked, so poisoning
    // is ignored.
    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
