//! SQLite implementation of [`CacheStore`].
//!
//! [`SqliteStore`] persists results in a single `calculations` table with
//! the payload stored as JSON TEXT via serde_json. Writes are upserts, so
//! the last writer for a signature wins.

use rusqlite::{params, Connection, OptionalExtension};

use dataflow_core::CalcResult;

use crate::error::CacheError;
use crate::signature::Signature;
use crate::traits::CacheStore;
use crate::types::CacheEntry;

/// SQLite-backed implementation of [`CacheStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a cache database at `path`.
    pub fn new(path: &str) -> Result<Self, CacheError> {
        let conn = crate::schema::open_database(path)?;
        Ok(SqliteStore { conn })
    }

    /// Opens an in-memory SQLite database (for testing).
    pub fn in_memory() -> Result<Self, CacheError> {
        let conn = crate::schema::open_in_memory()?;
        Ok(SqliteStore { conn })
    }
}

/// Rows whose signature column is not a valid digest are skipped.
fn parse_signature(raw: String) -> Option<Signature> {
    Signature::parse(&raw)
}

impl CacheStore for SqliteStore {
    fn get(&self, signature: &Signature) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT created_at, value_json FROM calculations WHERE signature = ?1",
                params![signature.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((created_at, value_json)) => {
                let value: CalcResult = serde_json::from_str(&value_json)?;
                Ok(Some(CacheEntry {
                    signature: signature.clone(),
                    created_at,
                    value,
                }))
            }
            None => Ok(None),
        }
    }

    fn put(&mut self, entry: CacheEntry) -> Result<(), CacheError> {
        let value_json = serde_json::to_string(&entry.value)?;
        self.conn.execute(
            "INSERT INTO calculations (signature, created_at, value_json) VALUES (?1, ?2, ?3)
             ON CONFLICT(signature) DO UPDATE SET
                created_at = excluded.created_at,
                value_json = excluded.value_json",
            params![entry.signature.as_str(), entry.created_at, value_json],
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(Signature, i64)>, CacheError> {
        let mut stmt = self
            .conn
            .prepare("SELECT signature, created_at FROM calculations ORDER BY created_at")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (raw, created_at) = row?;
            if let Some(signature) = parse_signature(raw) {
                entries.push((signature, created_at));
            }
        }
        Ok(entries)
    }

    fn remove(&mut self, signature: &Signature) -> Result<bool, CacheError> {
        let changed = self.conn.execute(
            "DELETE FROM calculations WHERE signature = ?1",
            params![signature.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn remove_older_than(&mut self, cutoff: i64) -> Result<usize, CacheError> {
        let changed = self.conn.execute(
            "DELETE FROM calculations WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(changed)
    }

    fn clear(&mut self) -> Result<(), CacheError> {
        self.conn.execute("DELETE FROM calculations", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM calculations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sig(c: char) -> Signature {
        Signature::parse(&c.to_string().repeat(64)).unwrap()
    }

    fn entry(c: char, created_at: i64) -> CacheEntry {
        CacheEntry {
            signature: sig(c),
            created_at,
            value: CalcResult::new(
                "refl.data",
                vec![serde_json::json!({"x": [1.5, 2.5], "label": "refl"})],
            ),
        }
    }

    #[test]
    fn put_then_get_returns_equal_value() {
        let mut store = SqliteStore::in_memory().unwrap();
        let stored = entry('a', 100);
        store.put(stored.clone()).unwrap();
        assert_eq!(store.get(&sig('a')).unwrap(), Some(stored));
        assert!(store.get(&sig('b')).unwrap().is_none());
    }

    #[test]
    fn put_overwrites() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.put(entry('a', 100)).unwrap();
        let mut newer = entry('a', 200);
        newer.value = CalcResult::new("refl.data", vec![]);
        store.put(newer.clone()).unwrap();

        assert_eq!(store.get(&sig('a')).unwrap(), Some(newer));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn entries_are_ordered_by_age() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.put(entry('b', 300)).unwrap();
        store.put(entry('a', 100)).unwrap();
        let entries = store.entries().unwrap();
        assert_eq!(entries, vec![(sig('a'), 100), (sig('b'), 300)]);
    }

    #[test]
    fn remove_older_than_and_clear() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.put(entry('a', 100)).unwrap();
        store.put(entry('b', 200)).unwrap();
        store.put(entry('c', 300)).unwrap();

        assert_eq!(store.remove_older_than(200).unwrap(), 1);
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.remove(&sig('b')).unwrap());
        assert!(!store.remove(&sig('b')).unwrap());

        store.clear().unwrap();
        assert!(store.is_empty().unwrap());
    }

    proptest! {
        #[test]
        fn stored_floats_come_back_bit_exact(
            xs in prop::collection::vec(any::<f64>().prop_filter("finite", |x| x.is_finite()), 1..64)
        ) {
            let mut store = SqliteStore::in_memory().unwrap();
            let stored = CacheEntry {
                signature: sig('d'),
                created_at: 1,
                value: CalcResult::new("refl.data", vec![serde_json::json!({ "y": xs })]),
            };
            store.put(stored.clone()).unwrap();

            let back = store.get(&sig('d')).unwrap().unwrap();
            prop_assert_eq!(&back, &stored);
            let ys: Vec<f64> = serde_json::from_value(back.value.values[0]["y"].clone()).unwrap();
            for (x, y) in xs.iter().zip(&ys) {
                prop_assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }
}
