//! Application state shared by all handlers.
//!
//! The store sits behind `Arc<tokio::sync::Mutex<>>`: the SQLite backend
//! holds a `rusqlite::Connection`, which is `!Sync`, so an `RwLock` is not
//! an option. Handlers await the lock without blocking the runtime.

use std::sync::Arc;

use osv_storage::{open_store, Dialect, StorageError, VulnStore};

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<tokio::sync::Mutex<Box<dyn VulnStore>>>,
}

impl AppState {
    /// Wraps an already opened store.
    pub fn new(store: Box<dyn VulnStore>) -> Self {
        AppState {
            store: Arc::new(tokio::sync::Mutex::new(store)),
        }
    }

    /// Creates state over an empty in-memory SQLite store (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = open_store(Dialect::Sqlite3, ":memory:", false)?;
        Ok(Self::new(store))
    }
}
