//! The async result cache shared by calculation batches.
//!
//! [`ResultCache`] is a cheap-to-clone handle over one [`CacheStore`]
//! behind a tokio mutex. Each operation locks for its own duration only, so
//! two batches computing the same signature may both miss and both write;
//! the later write wins.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use dataflow_core::CalcResult;

use crate::error::CacheError;
use crate::memory::InMemoryStore;
use crate::signature::Signature;
use crate::sqlite::SqliteStore;
use crate::traits::CacheStore;
use crate::types::{horizon_millis, CacheEntry};

/// Which backend a [`ResultCache`] ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Durable,
    Memory,
}

/// Async cache of calculation results keyed by [`Signature`].
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<Mutex<Box<dyn CacheStore>>>,
    backend: CacheBackendKind,
    fallback_reason: Option<Arc<str>>,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("backend", &self.backend)
            .field("fallback_reason", &self.fallback_reason)
            .finish_non_exhaustive()
    }
}

impl ResultCache {
    fn with_store(store: Box<dyn CacheStore>, backend: CacheBackendKind) -> Self {
        ResultCache {
            store: Arc::new(Mutex::new(store)),
            backend,
            fallback_reason: None,
        }
    }

    /// A non-persistent cache.
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(InMemoryStore::new()), CacheBackendKind::Memory)
    }

    /// Opens the durable cache at `path`, failing if it cannot be opened.
    pub fn open_durable(path: &str) -> Result<Self, CacheError> {
        let store = SqliteStore::new(path).map_err(|e| CacheError::Unavailable {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::with_store(Box::new(store), CacheBackendKind::Durable))
    }

    /// Opens the durable cache at `path`, falling back to memory with a
    /// single warning when that fails.
    pub fn open(path: &str) -> Self {
        match Self::open_durable(path) {
            Ok(cache) => {
                tracing::debug!(path, "opened durable result cache");
                cache
            }
            Err(err) => {
                tracing::warn!(
                    path,
                    error = %err,
                    "durable result cache unavailable; results will not persist across restarts"
                );
                let mut cache = Self::in_memory();
                cache.fallback_reason = Some(Arc::from(err.to_string()));
                cache
            }
        }
    }

    /// Opens the cache and evicts entries older than `max_age`.
    ///
    /// A failed sweep is logged and leaves the cache usable.
    pub async fn initialize(path: &str, max_age: Duration) -> Self {
        let cache = Self::open(path);
        match cache.remove_older_than(horizon_millis(max_age)).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "evicted expired cache entries"),
            Err(err) => tracing::warn!(error = %err, "cache eviction sweep failed"),
        }
        cache
    }

    pub fn backend(&self) -> CacheBackendKind {
        self.backend
    }

    pub fn is_persistent(&self) -> bool {
        self.backend == CacheBackendKind::Durable
    }

    /// Why the durable store was not used, if [`open`](Self::open) fell back.
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    /// Returns the cached result, or [`CacheError::NotFound`].
    pub async fn get(&self, signature: &Signature) -> Result<CalcResult, CacheError> {
        let store = self.store.lock().await;
        match store.get(signature)? {
            Some(entry) => Ok(entry.value),
            None => Err(CacheError::NotFound(signature.clone())),
        }
    }

    /// Stores `value`, overwriting any previous entry.
    pub async fn set(&self, signature: Signature, value: CalcResult) -> Result<(), CacheError> {
        let mut store = self.store.lock().await;
        store.put(CacheEntry::new(signature, value))
    }

    /// Stores a prepared entry, keeping its creation time.
    pub async fn insert_entry(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.store.lock().await.put(entry)
    }

    /// Every stored signature with its creation time.
    pub async fn entries(&self) -> Result<Vec<(Signature, i64)>, CacheError> {
        self.store.lock().await.entries()
    }

    /// Deletes entries created before `cutoff` (milliseconds since the epoch).
    pub async fn remove_older_than(&self, cutoff: i64) -> Result<usize, CacheError> {
        self.store.lock().await.remove_older_than(cutoff)
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.lock().await.clear()
    }

    pub async fn len(&self) -> Result<usize, CacheError> {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len().await? == 0)
    }
}
