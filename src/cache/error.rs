use thiserror::Error;

/// Faults internal to the cache layer. These never cross the `CacheStore`
/// boundary: the store logs them and falls back to a miss or a no-op.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend fault: {0}")]
    Backend(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
