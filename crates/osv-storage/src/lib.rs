//! Storage abstraction for OSV advisories.
//!
//! Provides the [`VulnStore`] trait defining the ingest/lookup contract that
//! every backend implements, plus two first-class backends:
//!
//! - [`SqliteStore`]: transactional, multi-table relational store. Ingest
//!   replaces an ecosystem's advisories atomically.
//! - [`KeyHashStore`]: denormalized hash store keyed by package name and
//!   identifier, over Redis ([`RedisHashClient`]) or an in-process map
//!   ([`MemoryHashClient`]). Ingest is a best-effort per-record upsert.
//!
//! Callers pick a backend by [`Dialect`] through [`open_store`] and only
//! ever talk to `dyn VulnStore` afterwards.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`traits`]: VulnStore trait definition
//! - [`dialect`]: Dialect selection and `open_store`
//! - [`schema`]: SQL schema migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation
//! - [`keyhash`]: KeyHashStore and its hash clients

pub mod dialect;
pub mod error;
pub mod keyhash;
pub mod schema;
pub mod sqlite;
pub mod traits;

// Re-export key types for ergonomic use.
pub use dialect::{open_store, Dialect};
pub use error::StorageError;
pub use keyhash::{HashClient, KeyHashStore, MemoryHashClient, RedisHashClient};
pub use sqlite::SqliteStore;
pub use traits::VulnStore;
