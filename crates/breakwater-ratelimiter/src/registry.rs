//! A name-keyed cache of [`RateLimiterLayer`]s, mirroring
//! [`breakwater_circuitbreaker::CircuitBreakerRegistry`]'s get-or-create
//! double-checked locking.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::RateLimiterConfigBuilder;
use crate::layer::RateLimiterLayer;

type ConfigFactory = Arc<dyn Fn(&str) -> RateLimiterConfigBuilder + Send + Sync>;

/// Caches rate limiter layers by name, creating one from the registry's
/// default configuration the first time a name is seen.
pub struct RateLimiterRegistry {
    layers: RwLock<HashMap<String, RateLimiterLayer>>,
    default_config: ConfigFactory,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::with_default(|name| RateLimiterConfigBuilder::new().name(name))
    }

    pub fn with_default<F>(factory: F) -> Self
    where
        F: Fn(&str) -> RateLimiterConfigBuilder + Send + Sync + 'static,
    {
        Self {
            layers: RwLock::new(HashMap::new()),
            default_config: Arc::new(factory),
        }
    }

    pub fn get_or_create(&self, name: &str) -> RateLimiterLayer {
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

    pub fn insert(&self, name: impl Into<String>, layer: RateLimiterLayer) {
        self.layers.write().unwrap().insert(name.into(), layer);
    }

    pub fn get(&self, name: &str) -> Option<RateLimiterLayer> {
        self.layers.read().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.layers.read().unwrap().keys().cloned().collect()
    }
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
