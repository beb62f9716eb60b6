//! Content-addressed result cache for calculation requests.
//!
//! Provides the request [`Signature`], the [`CacheStore`] trait with the
//! [`InMemoryStore`] and [`SqliteStore`] backends, and the async
//! [`ResultCache`] facade that falls back to memory when the durable store
//! cannot be opened.
//!
//! # Modules
//!
//! - [`signature`]: canonical request JSON and BLAKE3 signatures
//! - [`error`]: CacheError enum
//! - [`types`]: CacheEntry and timestamp helpers
//! - [`traits`]: CacheStore trait definition
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: SQL schema and migration setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`cache`]: ResultCache facade

pub mod cache;
pub mod error;
pub mod memory;
pub mod schema;
pub mod signature;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use cache::{CacheBackendKind, ResultCache};
pub use error::CacheError;
pub use memory::InMemoryStore;
pub use signature::{canonical_json, compute_signature, Signature};
pub use sqlite::SqliteStore;
pub use traits::CacheStore;
pub use types::{horizon_millis, now_millis, CacheEntry};
