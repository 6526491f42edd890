use std::hash::Hash;
use std::sync::Arc;

use breakwater_core::{BoxedEventListener, EventListeners, FnListener};

use crate::events::CacheEvent;
use crate::layer::CacheLayer;
use crate::store::{CacheStore, InMemoryCacheStore};

/// Extracts the cache key a request maps to.
pub type KeyExtractor<Req, K> = Arc<dyn Fn(&Req) -> K + Send + Sync>;

/// Immutable configuration for a [`crate::Cache`].
pub struct CacheConfig<Req, K, V> {
    pub(crate) name: String,
    pub(crate) key_extractor: KeyExtractor<Req, K>,
    pub(crate) store: Arc<dyn CacheStore<K, V>>,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

impl<Req, K, V> CacheConfig<Req, K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    pub fn builder() -> CacheConfigBuilder<Req, K, V> {
        CacheConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`CacheConfig`].
///
/// A `key_extractor` must be supplied before `build()`; there is no
/// sensible default since it depends entirely on the caller's request
/// shape.
pub struct CacheConfigBuilder<Req, K, V> {
    name: String,
    key_extractor: Option<KeyExtractor<Req, K>>,
    store: Option<Arc<dyn CacheStore<K, V>>>,
    event_listeners: EventListeners<CacheEvent>,
}

impl<Req, K, V> Default for CacheConfigBuilder<Req, K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, K, V> CacheConfigBuilder<Req, K, V> {
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            key_extractor: None,
            store: None,
            event_listeners: EventListeners::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the function that extracts a cache key from a request.
    /// Required before `build()`.
    pub fn key_extractor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Req) -> K + Send + Sync + 'static,
    {
        self.key_extractor = Some(Arc::new(f));
        self
    }

    /// Overrides the default in-memory, unbounded store with a caller-
    /// supplied [`CacheStore`], e.g. one backed by an external provider.
    pub fn store(mut self, store: Arc<dyn CacheStore<K, V>>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(Arc::new(FnListener::new(f)) as BoxedEventListener<CacheEvent>);
        self
    }

    pub fn add_listener(mut self, listener: BoxedEventListener<CacheEvent>) -> Self {
        self.event_listeners.add(listener);
        self
    }
}

impl<Req, K, V> CacheConfigBuilder<Req, K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Assembles the layer. Panics if no `key_extractor` was set: there
    /// is no sensible default key extraction strategy.
    pub fn build(self) -> CacheLayer<Req, K, V> {
        let key_extractor = self
            .key_extractor
            .expect("CacheConfigBuilder::key_extractor must be set before build()");
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()));

        CacheLayer::new(Arc::new(CacheConfig {
            name: self.name,
            key_extractor,
            store,
            event_listeners: self.event_listeners,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_key_extractor() {
        let layer = CacheConfig::<String, String, i32>::builder()
            .key_extractor(|req: &String| req.clone())
            .build();
        assert_eq!(layer.name(), "<unnamed>");
    }

    #[test]
    #[should_panic(expected = "key_extractor")]
    fn panics_without_key_extractor() {
        let _ = CacheConfig::<String, String, i32>::builder().build();
    }
}
