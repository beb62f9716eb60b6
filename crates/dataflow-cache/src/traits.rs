//! The [`CacheStore`] trait defining the backend contract for cached results.
//!
//! Both backends ([`InMemoryStore`](crate::memory::InMemoryStore) and
//! [`SqliteStore`](crate::sqlite::SqliteStore)) implement this trait so the
//! [`ResultCache`](crate::cache::ResultCache) can swap one for the other
//! when the durable store is unavailable.
//!
//! The trait is synchronous. The async facade serialises access behind a
//! mutex.

use crate::error::CacheError;
use crate::signature::Signature;
use crate::types::CacheEntry;

/// Storage contract for cached calculation results.
pub trait CacheStore: Send {
    /// Looks up an entry; `Ok(None)` on a miss.
    fn get(&self, signature: &Signature) -> Result<Option<CacheEntry>, CacheError>;

    /// Inserts or overwrites the entry for its signature.
    fn put(&mut self, entry: CacheEntry) -> Result<(), CacheError>;

    /// Every stored signature with its creation time.
    fn entries(&self) -> Result<Vec<(Signature, i64)>, CacheError>;

    /// Deletes one entry, returning whether it existed.
    fn remove(&mut self, signature: &Signature) -> Result<bool, CacheError>;

    /// Deletes entries created before `cutoff` (milliseconds since the
    /// epoch) and returns how many were removed.
    ///
    /// The default walks [`entries`](CacheStore::entries); backends with an
    /// index on creation time override it.
    fn remove_older_than(&mut self, cutoff: i64) -> Result<usize, CacheError> {
        let mut removed = 0;
        for (signature, created_at) in self.entries()? {
            if created_at < cutoff && self.remove(&signature)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Deletes every entry.
    fn clear(&mut self) -> Result<(), CacheError>;

    /// Number of stored entries.
    fn len(&self) -> Result<usize, CacheError>;

    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}
