/// Errors produced by a [`crate::Cache`]-wrapped service.
///
/// The cache never rejects a call on its own; it only ever forwards the
/// inner service's error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError<E> {
    #[error(transparent)]
    Inner(E),
}

impl<E> CacheError<E> {
    pub fn into_inner(self) -> E {
        match self {
            CacheError::Inner(e) => e,
        }
    }
}

impl<E> From<E> for CacheError<E> {
    fn from(e: E) -> Self {
        CacheError::Inner(e)
    }
}
