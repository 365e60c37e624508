//! Error types for stashcache
//!
//! Store failures on the hot path surface as [`stashdb::Error`] unchanged.
//! The types here cover the two outcomes that carry more than a store error.

use thiserror::Error;

/// Cache construction failed; no cache was created
#[derive(Debug, Error)]
pub enum OpenError {
    /// Capacity must be at least one entry
    #[error("cache capacity must be positive")]
    InvalidCapacity,

    /// The durable store could not be opened
    #[error("failed to open durable store: {0}")]
    Store(#[source] stashdb::Error),
}

/// Prefetch hit a store error part-way through.
///
/// Keys handled before the error stay admitted; `prefetched` counts them.
#[derive(Debug, Error)]
#[error("prefetch stopped after {prefetched} key(s): {source}")]
pub struct PrefetchError {
    /// Successes accumulated before the error
    pub prefetched: usize,
    /// The store error that stopped the prefetch
    #[source]
    pub source: stashdb::Error,
}
