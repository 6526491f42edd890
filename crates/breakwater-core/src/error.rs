//! Common error types shared by every guard crate.
//!
//! [`ResilienceError<E>`] lets callers compose circuit breaker, rate
//! limiter, and retry layers without hand-writing a `From` impl per
//! layer. [`ConfigurationError`] is the single error type every guard's
//! config builder returns for invalid values.

use std::fmt;
use std::time::Duration;

/// A unified error type that wraps every guard's rejection reason plus
/// the wrapped service's own error.
#[derive(Debug, Clone)]
pub enum ResilienceError<E> {
    /// The circuit breaker rejected the call because it is open.
    CircuitOpen {
        /// The circuit breaker's name, if configured.
        name: Option<String>,
    },
    /// The rate limiter rejected the call: no permit became available
    /// within the configured timeout.
    RateLimited {
        /// How long the caller waited before being rejected, if known.
        retry_after: Option<Duration>,
    },
    /// The retry guard exhausted its configured attempts.
    RetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: usize,
    },
    /// The wrapped service returned an application error.
    Application(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::CircuitOpen { name } => match name {
                Some(n) => write!(f, "circuit breaker '{n}' is open"),
                None => write!(f, "circuit breaker is open"),
            },
            ResilienceError::RateLimited { retry_after } => match retry_after {
                Some(d) => write!(f, "rate limited, retry after {d:?}"),
                None => write!(f, "rate limited"),
            },
            ResilienceError::RetriesExhausted { attempts } => {
                write!(f, "retries exhausted after {attempts} attempt(s)")
            }
            ResilienceError::Application(e) => write!(f, "application error: {e}"),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E> where E: std::error::Error {}

impl<E> ResilienceError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ResilienceError::RateLimited { .. })
    }

    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, ResilienceError::RetriesExhausted { .. })
    }

    pub fn is_application(&self) -> bool {
        matches!(self, ResilienceError::Application(_))
    }

    pub fn application_error(self) -> Option<E> {
        match self {
            ResilienceError::Application(e) => Some(e),
            _ => None,
        }
    }

    pub fn map_application<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CircuitOpen { name } => ResilienceError::CircuitOpen { name },
            ResilienceError::RateLimited { retry_after } => {
                ResilienceError::RateLimited { retry_after }
            }
            ResilienceError::RetriesExhausted { attempts } => {
                ResilienceError::RetriesExhausted { attempts }
            }
            ResilienceError::Application(e) => ResilienceError::Application(f(e)),
        }
    }
}

/// Raised synchronously by a config builder when a value is out of range.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{field} must be in (0.0, 1.0], got {value}")]
    ThresholdOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be a positive duration, got {value:?}")]
    NonPositiveDuration { field: &'static str, value: Duration },

    #[error("{field} must be > 0, got {value}")]
    NonPositiveCapacity { field: &'static str, value: i64 },

    #[error("{field} is required when {because}")]
    MissingField {
        field: &'static str,
        because: &'static str,
    },
}
