//! In-memory implementation of [`CacheStore`].
//!
//! [`InMemoryStore`] is the fallback when the durable store cannot be
//! opened, and the backend for tests. Contents last as long as the process.

use std::collections::HashMap;

use crate::error::CacheError;
use crate::signature::Signature;
use crate::traits::CacheStore;
use crate::types::CacheEntry;

/// HashMap-backed [`CacheStore`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    entries: HashMap<Signature, CacheEntry>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for InMemoryStore {
    fn get(&self, signature: &Signature) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.entries.get(signature).cloned())
    }

    fn put(&mut self, entry: CacheEntry) -> Result<(), CacheError> {
        self.entries.insert(entry.signature.clone(), entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(Signature, i64)>, CacheError> {
        Ok(self
            .entries
            .values()
            .map(|e| (e.signature.clone(), e.created_at))
            .collect())
    }

    fn remove(&mut self, signature: &Signature) -> Result<bool, CacheError> {
        Ok(self.entries.remove(signature).is_some())
    }

    fn remove_older_than(&mut self, cutoff: i64) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.created_at >= cutoff);
        Ok(before - self.entries.len())
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_core::CalcResult;

    fn sig(c: char) -> Signature {
        Signature::parse(&c.to_string().repeat(64)).unwrap()
    }

    fn entry(c: char, created_at: i64) -> CacheEntry {
        CacheEntry {
            signature: sig(c),
            created_at,
            value: CalcResult::new("refl.data", vec![serde_json::json!({"x": [1, 2]})]),
        }
    }

    #[test]
    fn put_get_overwrite() {
        let mut store = InMemoryStore::new();
        assert!(store.get(&sig('a')).unwrap().is_none());

        store.put(entry('a', 1)).unwrap();
        store.put(entry('a', 2)).unwrap();
        assert_eq!(store.get(&sig('a')).unwrap().unwrap().created_at, 2);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn remove_older_than_keeps_boundary() {
        let mut store = InMemoryStore::new();
        store.put(entry('a', 10)).unwrap();
        store.put(entry('b', 20)).unwrap();
        store.put(entry('c', 30)).unwrap();

        assert_eq!(store.remove_older_than(20).unwrap(), 1);
        assert!(store.get(&sig('a')).unwrap().is_none());
        assert!(store.get(&sig('b')).unwrap().is_some());
    }

    #[test]
    fn clear_empties() {
        let mut store = InMemoryStore::new();
        store.put(entry('a', 10)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
        assert!(!store.remove(&sig('a')).unwrap());
    }
}
