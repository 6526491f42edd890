//! A name-keyed cache of [`CircuitBreakerLayer`]s.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::config::CircuitBreakerConfigBuilder;
use crate::layer::CircuitBreakerLayer;

/// Builds the config used for names the registry hasn't seen yet.
type ConfigFactory<Err> =
    Arc<dyn Fn(&str) -> CircuitBreakerConfigBuilder<Err> + Send + Sync>;

/// Caches circuit breaker layers by name, creating one from the
/// registry's default configuration the first time a name is seen.
pub struct CircuitBreakerRegistry<Err> {
    layers: RwLock<HashMap<String, CircuitBreakerLayer<Err>>>,
    default_config: ConfigFactory<Err>,
}

impl<Err> CircuitBreakerRegistry<Err>
where
    Err: Send + Sync + 'static,
{
    /// Creates a registry that builds every new name from the same
    /// default configuration.
    pub fn new() -> Self {
        Self::with_default(|name| CircuitBreakerConfigBuilder::new().name(name))
    }

    /// Creates a registry that derives each new name's configuration
    /// from the given factory, e.g. to vary defaults by naming
    /// convention.
    pub fn with_default<F>(factory: F) -> Self
    where
        F: Fn(&str) -> CircuitBreakerConfigBuilder<Err> + Send + Sync + 'static,
    {
        Self {
            layers: RwLock::new(HashMap::new()),
            default_config: Arc::new(factory),
        }
    }

    /// Returns the layer for `name`, creating it from the default
    /// configuration if this is the first time `name` has been seen.
    pub fn get_or_create(&self, name: &str) -> CircuitBreakerLayer<Err> {
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

    /// Inserts or replaces the layer registered for `name`.
    pub fn insert(&self, name: impl Into<String>, layer: CircuitBreakerLayer<Err>) {
        self.layers.write().unwrap().insert(name.into(), layer);
    }

    /// Returns the layer registered for `name`, if any, without
    /// creating one.
    pub fn get(&self, name: &str) -> Option<CircuitBreakerLayer<Err>> {
        self.layers.read().unwrap().get(name).cloned()
    }

    /// Returns the names currently registered.
    pub fn names(&self) -> Vec<String> {
        self.layers.read().unwrap().keys().cloned().collect()
    }
}

impl<Err> Default for CircuitBreakerRegistry<Err>
where
    Err: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let registry = CircuitBreakerRegistry::<()>::new();
        let a = registry.get_or_create("payments");
        let b = registry.get_or_create("payments");
        assert_eq!(a.name(), b.name());
        assert_eq!(registry.names(), vec!["payments".to_string()]);
    }

    #[test]
    fn distinct_names_get_distinct_layers() {
        let registry = CircuitBreakerRegistry::<()>::new();
        registry.get_or_create("a");
        registry.get_or_create("b");
        let mut names = registry.names();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn insert_overrides_default_creation() {
        let registry = CircuitBreakerRegistry::<()>::new();
        let custom = CircuitBreakerConfigBuilder::new()
            .name("custom")
            .failure_rate_threshold(0.9)
            .build();
        registry.insert("custom", custom);
        let fetched = registry.get("custom").expect("inserted layer present");
        assert_eq!(fetched.name(), "custom");
    }
}
