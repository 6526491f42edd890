use breakwater_core::ResilienceError;

/// Errors produced by a [`crate::RateLimiter`]-wrapped service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimiterError<E> {
    /// No permit became available within the configured timeout.
    #[error("rate limiter rejected the call: no permit available within the timeout")]
    RequestNotPermitted,

    /// The inner service returned an error.
    #[error(transparent)]
    Inner(E),
}

impl<E> RateLimiterError<E> {
    pub fn is_request_not_permitted(&self) -> bool {
        matches!(self, RateLimiterError::RequestNotPermitted)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            RateLimiterError::Inner(e) => Some(e),
            RateLimiterError::RequestNotPermitted => None,
        }
    }
}

impl<E> From<E> for RateLimiterError<E> {
    fn from(e: E) -> Self {
        RateLimiterError::Inner(e)
    }
}

impl<E> From<RateLimiterError<E>> for ResilienceError<E> {
    fn from(err: RateLimiterError<E>) -> Self {
        match err {
            RateLimiterError::RequestNotPermitted => ResilienceError::RateLimited { retry_after: None },
            RateLimiterError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
