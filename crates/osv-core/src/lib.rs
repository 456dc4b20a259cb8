//! Canonical record model and feed conversion for OSV advisories.
//!
//! This crate owns everything that is independent of where advisories are
//! stored: the normalized [`Advisory`] graph, the raw per-ecosystem feed
//! shape ([`OsvJson`]), the pure conversion between the two, and the
//! [`FetchMeta`] marker that storage backends persist after each ingest.
//!
//! # Modules
//!
//! - [`model`]: Advisory, Package, Affects and the owned child records
//! - [`ecosystem`]: the six supported [`EcosystemType`] tags
//! - [`feed`]: serde model of one feed file as published
//! - [`convert`]: feed records -> canonical advisories
//! - [`meta`]: FetchMeta, schema version and build stamp
//! - [`error`]: CoreError and ConvertError

pub mod convert;
pub mod ecosystem;
pub mod error;
pub mod feed;
pub mod meta;
pub mod model;

// Re-export commonly used types
pub use convert::convert;
pub use ecosystem::EcosystemType;
pub use error::{ConvertError, CoreError};
pub use feed::{parse_feed_record, OsvJson};
pub use meta::{BuildStamp, FetchMeta, LATEST_SCHEMA_VERSION};
pub use model::{
    withdrawn_never, Advisory, AffectedRange, AffectedVersion, Affects, Alias, DatabaseSpecific,
    EcosystemSpecific, Package, Reference, Related,
};
