use std::sync::Arc;

use tower::Layer;

use crate::config::RateLimiterConfig;
use crate::RateLimiter;

/// A Tower [`Layer`] that wraps a service with rate limiting behavior.
///
/// Built via [`RateLimiterConfig::builder`]; cloning is cheap since the
/// config is held behind an `Arc` and shared by every service produced
/// from this layer. Each call to [`Layer::layer`] stamps out a fresh
/// permit-accounting state, mirroring how [`crate::RateLimiter`] itself
/// has no shared state with sibling wraps of the same layer.
pub struct RateLimiterLayer {
    config: Arc<RateLimiterConfig>,
}

impl Clone for RateLimiterLayer {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl RateLimiterLayer {
    pub(crate) fn new(config: Arc<RateLimiterConfig>) -> Self {
        Self { config }
    }

    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub(crate) fn config(&self) -> &Arc<RateLimiterConfig> {
        &self.config
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiter::new(inner, Arc::clone(&self.config))
    }
}
