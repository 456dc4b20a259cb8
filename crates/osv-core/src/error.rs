//! Error types for osv-core.
//!
//! [`CoreError`] covers invalid tags handed to the model, [`ConvertError`]
//! covers everything that can abort a feed conversion batch.

use thiserror::Error;

/// Errors produced by the canonical model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An ecosystem tag outside the supported set.
    #[error("unknown ecosystem type: '{tag}'")]
    UnknownEcosystem { tag: String },
}

/// Errors produced while converting feed records into advisories.
///
/// Any of these aborts the whole batch; no partial output is returned.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A timestamp field did not parse as RFC 3339.
    #[error("invalid {field} timestamp '{value}' in {ecosystem} advisory {id}: {source}")]
    InvalidTimestamp {
        ecosystem: String,
        id: String,
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A feed file was not valid OSV JSON.
    #[error("malformed feed record: {0}")]
    MalformedRecord(#[from] serde_json::Error),
}
