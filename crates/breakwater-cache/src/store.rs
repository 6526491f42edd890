//! The pluggable storage seam behind [`crate::CacheLayer`].
//!
//! This crate is explicitly out of the core's scope (see the workspace
//! root's purpose note): it offers one in-memory, `HashMap`-backed
//! implementation to prove the decorator shape, with no eviction policy
//! or TTL. A production deployment is expected to bring its own
//! [`CacheStore`] backed by an external provider.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// Storage backing a [`crate::CacheLayer`].
///
/// Implementors must be safe to share across every clone of a `Cache`
/// service, since one store instance is wrapped in an `Arc` and handed
/// to every clone produced from the same layer.
pub trait CacheStore<K, V>: Send + Sync {
    /// Returns the cached value for `key`, if present.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` under `key`, replacing any existing entry.
    fn insert(&self, key: K, value: V);

    /// The number of entries currently stored.
    fn len(&self) -> usize;
}

/// A `Mutex<HashMap<K, V>>`-backed [`CacheStore`] with unbounded growth.
///
/// No capacity limit and no expiry: callers who need either should
/// implement [`CacheStore`] against an external provider instead, per
/// this crate's "thin glue" scope.
pub struct InMemoryCacheStore<K, V> {
    entries: Mutex<HashMap<K, V>>,
}

impl<K, V> InMemoryCacheStore<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryCacheStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheStore<K, V> for InMemoryCacheStore<K, V>
where
    K: Hash + Eq + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        self.entries
            .lock()
            .expect("cache store mutex poisoned")
            .get(key)
            .cloned()
    }

    fn insert(&self, key: K, value: V) {
        self.entries
            .lock()
            .expect("cache store mutex poisoned")
            .insert(key, value);
    }

    fn len(&self) -> usize {
        self.entries.lock().expect("cache store mutex poisoned").len()
    }
}
