use std::error::Error;
use std::sync::Arc;

/// Boxed error accepted from fetch operations.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Errors surfaced by [`SingleFlightCache`](crate::SingleFlightCache).
///
/// A failure is only returned when there is no previously cached value to
/// fall back on. Failures of background refreshes are logged and never
/// reach callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    /// The fetch operation could not produce a value.
    ///
    /// The source is shared so that every caller waiting on the same
    /// populate receives the same failure.
    #[error("fetch failed: {0}")]
    FetchFailed(#[source] Arc<dyn Error + Send + Sync + 'static>),
}

impl CacheError {
    pub(crate) fn fetch_failed(err: impl Into<BoxError>) -> Self {
        CacheError::FetchFailed(Arc::from(err.into()))
    }

    /// Returns the error reported by the fetch operation.
    pub fn fetch_error(&self) -> &(dyn Error + Send + Sync + 'static) {
        match self {
            CacheError::FetchFailed(source) => &**source,
        }
    }
}
