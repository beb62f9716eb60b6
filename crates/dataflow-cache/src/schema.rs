//! SQL schema and migration setup for the durable cache.
//!
//! Uses `rusqlite_migration` to track the schema through SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::CacheError;

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!(
        "migrations/001_initial_schema.sql"
    ))])
}

/// Opens (or creates) the cache database at `path` in WAL mode with all
/// pending migrations applied.
pub fn open_database(path: &str) -> Result<Connection, CacheError> {
    let mut conn = Connection::open(path)?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

/// Opens an in-memory cache database with all migrations applied.
pub fn open_in_memory() -> Result<Connection, CacheError> {
    let mut conn = Connection::open_in_memory()?;
    configure_and_migrate(&mut conn)?;
    Ok(conn)
}

fn configure_and_migrate(conn: &mut Connection) -> Result<(), CacheError> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // NORMAL is durable enough under WAL for a rebuildable cache.
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    migrations()
        .to_latest(conn)
        .map_err(|e| CacheError::Migration(e.to_string()))?;

    Ok(())
}
