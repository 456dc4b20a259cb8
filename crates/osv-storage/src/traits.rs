//! The [`VulnStore`] trait defining the storage contract for advisories.
//!
//! Both backends implement this trait and are fully swappable: the query
//! layer and the CLI only ever hold a `Box<dyn VulnStore>`.
//!
//! The trait is synchronous. Every call may block on disk or network I/O and
//! is meant to run on whatever worker the caller dispatches it from.

use osv_core::{convert, Advisory, EcosystemType, FetchMeta, OsvJson, LATEST_SCHEMA_VERSION};

use crate::error::StorageError;

/// The storage contract for advisories.
pub trait VulnStore: Send {
    // -------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------

    /// Dialect name of the backend (`sqlite3`, `redis`, `memory`).
    fn name(&self) -> &'static str;

    /// Connects to `location` (a file path or URL). `debug` turns on
    /// statement-level logging where the backend supports it.
    ///
    /// Lock contention is reported as [`StorageError::Locked`].
    fn open(&mut self, location: &str, debug: bool) -> Result<(), StorageError>;

    /// Releases the connection. Closing a store that was never opened is
    /// not an error.
    fn close(&mut self) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Schema and metadata
    // -------------------------------------------------------------------

    /// Brings the persisted structure up to the current schema.
    fn migrate_schema(&mut self) -> Result<(), StorageError>;

    /// Detects a pre-versioning layout that cannot be migrated.
    fn is_legacy_schema(&self) -> Result<bool, StorageError>;

    /// Returns the persisted [`FetchMeta`], or a fresh one stamped with the
    /// current build when nothing has been ingested yet.
    fn fetch_meta(&self) -> Result<FetchMeta, StorageError>;

    /// Persists `meta`, always overwriting its revision and schema version
    /// with the current build's values.
    fn upsert_fetch_meta(&mut self, meta: &FetchMeta) -> Result<(), StorageError>;

    // -------------------------------------------------------------------
    // Ingest and lookup
    // -------------------------------------------------------------------

    /// Stores the advisories of one ecosystem.
    fn ingest(
        &mut self,
        ecosystem: EcosystemType,
        advisories: &[Advisory],
    ) -> Result<(), StorageError>;

    /// Finds advisories whose entry id or any alias equals `id`.
    ///
    /// `ecosystem` of `None` or `Some("")` is unrestricted. No match is an
    /// empty vector, not an error.
    fn find_by_id(
        &self,
        id: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError>;

    /// Finds advisories for the package called `name`. Same filter and
    /// empty-result rules as [`VulnStore::find_by_id`].
    fn find_by_package(
        &self,
        name: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError>;

    // -------------------------------------------------------------------
    // Provided
    // -------------------------------------------------------------------

    /// Converts raw feed records and ingests them. A conversion failure
    /// leaves the store untouched.
    fn ingest_feed(
        &mut self,
        ecosystem: EcosystemType,
        records: &[OsvJson],
    ) -> Result<(), StorageError> {
        let advisories = convert(ecosystem, records)?;
        self.ingest(ecosystem, &advisories)
    }

    /// Returns the stored [`FetchMeta`], refusing outdated stores.
    fn check_fetch_meta(&self) -> Result<FetchMeta, StorageError> {
        let meta = self.fetch_meta()?;
        if meta.is_outdated() {
            return Err(StorageError::OutdatedSchema {
                stored: meta.schema_version,
                expected: LATEST_SCHEMA_VERSION,
            });
        }
        Ok(meta)
    }
}

/// Normalizes an ecosystem filter: empty means unrestricted.
pub(crate) fn ecosystem_filter(ecosystem: Option<&str>) -> Option<&str> {
    ecosystem.filter(|eco| !eco.is_empty())
}
