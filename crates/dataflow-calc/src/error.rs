//! Error types for calculation batches.
//!
//! [`RemoteError`] is what the calculation service reports for one request.
//! [`CalcError`] wraps the failures of every layer a batch passes through.

use dataflow_cache::CacheError;
use dataflow_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// A failure reported by the remote calculation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RemoteError {
    /// A file modification time in the request no longer matches the data
    /// source. Recovered by refreshing times and resubmitting.
    #[error("stale file reference: {message}")]
    Stale {
        path: Option<String>,
        message: String,
    },

    /// Any other service failure.
    #[error("calculation failed: {0}")]
    Failure(String),
}

impl RemoteError {
    /// Maps a service error message to a [`RemoteError`].
    ///
    /// Messages of the form "Requested mtime is newer than repository mtime
    /// for 'path'" (or "older than") are staleness errors.
    pub fn classify(message: impl Into<String>) -> RemoteError {
        let message = message.into();
        let lower = message.to_lowercase();
        let stale = lower.contains("mtime")
            && (lower.contains("newer than") || lower.contains("older than"));
        if !stale {
            return RemoteError::Failure(message);
        }
        let path = message.rsplit_once(" for ").map(|(_, tail)| {
            tail.trim()
                .trim_matches(|c| c == '\'' || c == '"')
                .to_string()
        });
        RemoteError::Stale { path, message }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, RemoteError::Stale { .. })
    }
}

/// Errors produced while running a calculation batch.
#[derive(Debug, Error)]
pub enum CalcError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The batch was cancelled by the caller.
    #[error("calculation cancelled")]
    Cancelled,
}
