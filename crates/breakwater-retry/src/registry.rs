//! A name-keyed cache of [`RetryLayer`]s, mirroring
//! `breakwater_circuitbreaker::CircuitBreakerRegistry`'s get-or-create
//! double-checked locking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::RetryConfigBuilder;
use crate::layer::RetryLayer;

type ConfigFactory<Req, Res, E> = Arc<dyn Fn(&str) -> RetryConfigBuilder<Req, Res, E> + Send + Sync>;

/// Caches retry layers by name, creating one from the registry's
/// default configuration the first time a name is seen.
pub struct RetryRegistry<Req, Res, E> {
    layers: RwLock<HashMap<String, RetryLayer<Req, Res, E>>>,
    default_config: ConfigFactory<Req, Res, E>,
}

impl<Req, Res, E> RetryRegistry<Req, Res, E>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_default(|name| RetryConfigBuilder::new().name(name))
    }

    pub fn with_default<F>(factory: F) -> Self
    where
        F: Fn(&str) -> RetryConfigBuilder<Req, Res, E> + Send + Sync + 'static,
    {
        Self {
            layers: RwLock::new(HashMap::new()),
            default_config: Arc::new(factory),
        }
    }

    pub fn get_or_create(&self, name: &str) -> RetryLayer<Req, Res, E> {
        if let Some(layer) = self.layers.read().unwrap().get(name) {
            return layer.clone();
        }

        let mut layers = self.layers.write().unwrap();
        if let Some(layer) = layers.get(name) {
            return layer.clone();
        }

        let layer = (self.default_config)(name).build();
        layers.insert(name.to_string(), layer.clone());
        layer
    }

    pub fn insert(&self, name: impl Into<String>, layer: RetryLayer<Req, Res, E>) {
        self.layers.write().unwrap().insert(name.into(), layer);
    }

    pub fn get(&self, name: &str) -> Option<RetryLayer<Req, Res, E>> {
        self.layers.read().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.layers.read().unwrap().keys().cloned().collect()
    }
}

impl<Req, Res, E> Default for RetryRegistry<Req, Res, E>
where
    Req: Send + Sync + 'static,
    Res: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
