use breakwater_core::ResilienceError;

/// Errors produced by a [`crate::Retry`]-wrapped service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RetryError<E> {
    /// All configured attempts were exhausted without a success.
    #[error("retry attempts exhausted after {attempts} attempt(s)")]
    MaxRetriesExceeded { attempts: usize, source: E },

    /// The inner service returned an error the retry predicate chose not
    /// to retry; propagated on the first occurrence.
    #[error(transparent)]
    Inner(E),
}

impl<E> RetryError<E> {
    pub fn is_max_retries_exceeded(&self) -> bool {
        matches!(self, RetryError::MaxRetriesExceeded { .. })
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::MaxRetriesExceeded { source, .. } => source,
            RetryError::Inner(e) => e,
        }
    }
}

impl<E> From<RetryError<E>> for ResilienceError<E> {
    fn from(err: RetryError<E>) -> Self {
        match err {
            RetryError::MaxRetriesExceeded { attempts, source: _ } => {
                ResilienceError::RetriesExhausted { attempts }
            }
            RetryError::Inner(e) => ResilienceError::Application(e),
        }
    }
}
