use std::sync::Arc;

use tower::Layer;

use crate::config::CircuitBreakerConfig;
use crate::CircuitBreaker;

/// A Tower [`Layer`] that wraps a service with circuit breaker behavior.
///
/// Built via [`CircuitBreakerConfig::builder`]; cloning is cheap since the
/// config is held behind an `Arc` and shared by every service produced
/// from this layer.
pub struct CircuitBreakerLayer<Err> {
    config: Arc<CircuitBreakerConfig<Err>>,
}

impl<Err> Clone for CircuitBreakerLayer<Err> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<Err> CircuitBreakerLayer<Err> {
    pub(crate) fn new(config: Arc<CircuitBreakerConfig<Err>>) -> Self {
        Self { config }
    }

    /// Returns the name this layer's circuit breaker instances will share.
    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub(crate) fn config(&self) -> &Arc<CircuitBreakerConfig<Err>> {
        &self.config
    }
}

impl<S, Req, Res, Err> Layer<S> for CircuitBreakerLayer<Err>
where
    S: tower::Service<Req, Response = Res, Error = Err>,
{
    type Service = CircuitBreaker<S, Req, Res, Err>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreaker::new(inner, Arc::clone(&self.config))
    }
}
