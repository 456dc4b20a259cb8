//! HTTP/JSON query API over an OSV advisory store.
//!
//! Exposes read-only lookups by identifier and by package name, optionally
//! restricted to one ecosystem. The store is any `dyn VulnStore`, so the
//! same router serves the SQLite and key-hash backends.

pub mod error;
pub mod handlers;
pub mod router;
pub mod serve;
pub mod state;

pub use serve::{serve, ServerConfig};
