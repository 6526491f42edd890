use breakwater_core::ResilienceError;

/// Errors produced by a [`crate::CircuitBreaker`]-wrapped service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without reaching the
    /// inner service.
    #[error("circuit breaker is open")]
    CallNotPermitted,

    /// The inner service returned an error.
    #[error(transparent)]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_call_not_permitted(&self) -> bool {
        matches!(self, CircuitBreakerError::CallNotPermitted)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::CallNotPermitted => None,
        }
    }
}

impl<E> From<E> for CircuitBreakerError<E> {
    fn from(e: E) -> Self {
        CircuitBreakerError::Inner(e)
    }
}

impl<E> From<CircuitBreakerError<E>> for ResilienceError<E> {
    fn from(err: CircuitBreakerError<E>) -> Self {
        match err {
            CircuitBreakerError::CallNotPermitted => ResilienceError::CircuitOpen { name: None },
            CircuitBreakerError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
