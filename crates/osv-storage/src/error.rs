//! Storage error types for osv-storage.
//!
//! [`StorageError`] covers connection failures (with lock contention as its
//! own variant), schema incompatibility, ingest failures and backend faults.
//! "No matching advisory" is never an error.

use thiserror::Error;

use osv_core::ConvertError;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database is held by another connection. Close it and retry
    /// rather than retrying blindly.
    #[error("database is locked by another connection: {source}")]
    Locked {
        #[source]
        source: rusqlite::Error,
    },

    /// Any other SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    /// A Redis command or connection failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Feed records could not be converted; nothing was written.
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// Opening the store failed.
    #[error("failed to open {dialect} database at '{location}': {source}")]
    Open {
        dialect: &'static str,
        location: String,
        #[source]
        source: Box<StorageError>,
    },

    /// An operation was attempted before `open` or after `close`.
    #[error("{backend} store is not open")]
    NotOpen { backend: &'static str },

    /// The configured database dialect is not available.
    #[error("unsupported database dialect: '{dialect}'")]
    UnsupportedDialect { dialect: String },

    /// The database predates schema versioning and cannot be migrated.
    #[error("incompatible legacy schema: delete the database and ingest again")]
    LegacySchema,

    /// The stored schema version does not match this build.
    #[error("schema version {stored} is incompatible with expected version {expected}: delete the database and ingest again")]
    OutdatedSchema { stored: u32, expected: u32 },

    /// Ingesting an ecosystem failed. The relational backend has rolled back
    /// all of it; the key-hash backend keeps records written before the
    /// failure.
    #[error("failed to ingest {ecosystem} advisories: {source}")]
    Ingest {
        ecosystem: String,
        #[source]
        source: Box<StorageError>,
    },

    /// Stored data could not be read back into the model.
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// The backend's shared connection state became unusable.
    #[error("backend error: {reason}")]
    Backend { reason: String },
}

impl StorageError {
    /// Whether this error (or the error it wraps) is lock contention.
    pub fn is_locked(&self) -> bool {
        match self {
            StorageError::Locked { .. } => true,
            StorageError::Open { source, .. } | StorageError::Ingest { source, .. } => {
                source.is_locked()
            }
            _ => false,
        }
    }

    /// Whether the store must be discarded and re-ingested before use.
    pub fn is_schema_incompatible(&self) -> bool {
        matches!(
            self,
            StorageError::LegacySchema | StorageError::OutdatedSchema { .. }
        )
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                StorageError::Locked { source: err }
            }
            _ => StorageError::Sqlite(err),
        }
    }
}
