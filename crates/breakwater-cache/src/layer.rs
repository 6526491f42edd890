use std::hash::Hash;
use std::sync::Arc;

use tower::Layer;

use crate::config::CacheConfig;
use crate::Cache;

/// A Tower [`Layer`] that memoizes responses behind a [`crate::CacheStore`].
///
/// Built via [`CacheConfig::builder`]; cloning is cheap since the config
/// (and the store it owns) is held behind an `Arc` and shared by every
/// service produced from this layer, so wraps of the same layer share
/// one cache.
pub struct CacheLayer<Req, K, V> {
    config: Arc<CacheConfig<Req, K, V>>,
}

impl<Req, K, V> Clone for CacheLayer<Req, K, V> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<Req, K, V> CacheLayer<Req, K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    pub(crate) fn new(config: Arc<CacheConfig<Req, K, V>>) -> Self {
        Self { config }
    }

    pub fn builder() -> crate::config::CacheConfigBuilder<Req, K, V> {
        crate::config::CacheConfigBuilder::new()
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }
}

impl<S, Req, K, V> Layer<S> for CacheLayer<Req, K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: tower::Service<Req, Response = V>,
{
    type Service = Cache<S, Req, K, V>;

    fn layer(&self, inner: S) -> Self::Service {
        Cache::new(inner, Arc::clone(&self.config))
    }
}
