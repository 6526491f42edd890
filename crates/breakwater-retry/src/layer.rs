use std::sync::Arc;

use tower::Layer;

use crate::config::RetryConfig;
use crate::Retry;

/// A Tower [`Layer`] that applies bounded-attempt retry behavior to a
/// service.
///
/// Built via [`RetryConfig::builder`]; cloning is cheap since the
/// config is held behind an `Arc` and shared by every service produced
/// from this layer.
pub struct RetryLayer<Req, Res, E> {
    config: Arc<RetryConfig<Req, Res, E>>,
}

impl<Req, Res, E> Clone for RetryLayer<Req, Res, E> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
        }
    }
}

impl<Req, Res, E> RetryLayer<Req, Res, E> {
    pub(crate) fn new(config: Arc<RetryConfig<Req, Res, E>>) -> Self {
        Self { config }
    }

    /// Returns the name this layer's retry instances will share.
    pub fn name(&self) -> &str {
        self.config.name()
    }

    pub(crate) fn config(&self) -> &Arc<RetryConfig<Req, Res, E>> {
        &self.config
    }
}

impl<S, Req, Res, E> Layer<S> for RetryLayer<Req, Res, E>
where
    S: tower::Service<Req, Response = Res, Error = E>,
{
    type Service = Retry<S, Req, Res, E>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry::new(inner, Arc::clone(&self.config))
    }
}
