//! Cache error types for dataflow-cache.
//!
//! [`CacheError::NotFound`] is the ordinary miss signal and is recovered by
//! the caller. The remaining variants describe backend failures.

use thiserror::Error;

use crate::signature::Signature;

/// Errors produced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No entry is stored under the signature.
    #[error("no cached result for signature {0}")]
    NotFound(Signature),

    /// The SQLite backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A schema migration could not be applied.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The durable store could not be opened.
    #[error("durable cache unavailable at {path}: {reason}")]
    Unavailable { path: String, reason: String },
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}
