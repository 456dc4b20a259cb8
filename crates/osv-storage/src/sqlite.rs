//! SQLite implementation of [`VulnStore`].
//!
//! [`SqliteStore`] keeps every advisory as a graph of rows linked by integer
//! foreign keys. Ingest replaces one ecosystem inside a single transaction:
//! the advisories currently filed under that ecosystem are deleted table by
//! table in [`CASCADE_DELETE_ORDER`], then the new set is inserted in chunks
//! of [`INSERT_BATCH_SIZE`]. Any failure drops the transaction, so readers
//! only ever observe the complete old set or the complete new set.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, error, info};

use osv_core::{
    Advisory, AffectedRange, AffectedVersion, Affects, Alias, BuildStamp, DatabaseSpecific,
    EcosystemSpecific, EcosystemType, FetchMeta, Package, Reference, Related,
};

use crate::error::StorageError;
use crate::schema;
use crate::traits::{ecosystem_filter, VulnStore};

const DIALECT: &str = "sqlite3";

/// Advisories inserted per batch during ingest.
pub const INSERT_BATCH_SIZE: usize = 10;

/// Advisory ids bound per `IN (...)` list when deleting.
const DELETE_CHUNK_SIZE: usize = 500;

/// How a child table is tied to the advisories being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    /// Rows keyed by `affects_id` of the advisories' affects rows.
    ViaAffects,
    /// Rows keyed by `advisory_id`.
    ByAdvisory,
    /// The advisory rows themselves.
    Root,
}

/// Tables cleared when an ecosystem is replaced, leaves before parents.
///
/// Every table is scoped by the ids of advisories whose stored
/// `advisory_packages.ecosystem` equals the ingested ecosystem tag. A record
/// ingested under one tag whose feed names a different package ecosystem
/// (e.g. `Debian` inside the `Linux` feed) is outside that set and survives
/// every later replacement of the tag.
pub const CASCADE_DELETE_ORDER: [(&str, DeleteScope); 10] = [
    ("affects_ranges", DeleteScope::ViaAffects),
    ("affects_versions", DeleteScope::ViaAffects),
    ("advisory_affects", DeleteScope::ByAdvisory),
    ("advisory_aliases", DeleteScope::ByAdvisory),
    ("advisory_related", DeleteScope::ByAdvisory),
    ("advisory_packages", DeleteScope::ByAdvisory),
    ("advisory_references", DeleteScope::ByAdvisory),
    ("ecosystem_specific", DeleteScope::ByAdvisory),
    ("database_specific", DeleteScope::ByAdvisory),
    ("advisories", DeleteScope::Root),
];

/// SQLite-backed implementation of [`VulnStore`].
///
/// Lookups share one connection; the connection is `!Sync`, so callers that
/// need concurrent access put the store behind a mutex.
pub struct SqliteStore {
    conn: Option<Connection>,
    stamp: BuildStamp,
    busy_timeout: Duration,
}

impl SqliteStore {
    /// Creates an unopened store stamped with the current build.
    pub fn new() -> Self {
        Self::with_stamp(BuildStamp::CURRENT)
    }

    /// Creates an unopened store that writes `stamp` into its FetchMeta.
    pub fn with_stamp(stamp: BuildStamp) -> Self {
        SqliteStore {
            conn: None,
            stamp,
            busy_timeout: schema::BUSY_TIMEOUT,
        }
    }

    /// Sets how long statements wait on another connection's lock before
    /// failing with [`StorageError::Locked`]. Applies from the next `open`.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Opens a migrated in-memory database (for testing).
    pub fn in_memory() -> Result<Self, StorageError> {
        let mut store = Self::new();
        store.open(":memory:", false)?;
        store.migrate_schema()?;
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn conn(&self) -> Result<&Connection, StorageError> {
        self.conn
            .as_ref()
            .ok_or(StorageError::NotOpen { backend: DIALECT })
    }

    fn conn_mut(&mut self) -> Result<&mut Connection, StorageError> {
        self.conn
            .as_mut()
            .ok_or(StorageError::NotOpen { backend: DIALECT })
    }

    /// Runs an id query, then loads the full graph of each match. Both steps
    /// share one read transaction so a concurrent ingest commit cannot split
    /// them.
    fn find_where(
        &self,
        sql: &str,
        key: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let ids: Vec<i64> = {
            let mut stmt = tx.prepare_cached(sql)?;
            let rows = stmt.query_map(params![key, ecosystem_filter(ecosystem)], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let mut advisories = Vec::with_capacity(ids.len());
        for id in ids {
            advisories.push(load_advisory(&tx, id)?);
        }
        tx.commit()?;
        Ok(advisories)
    }
}

impl Default for SqliteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn log_sql(sql: &str) {
    debug!(target: "osv_storage::sql", "{}", sql);
}

impl VulnStore for SqliteStore {
    fn name(&self) -> &'static str {
        DIALECT
    }

    fn open(&mut self, location: &str, debug: bool) -> Result<(), StorageError> {
        let mut conn = schema::open_connection(location, self.busy_timeout).map_err(|source| {
            StorageError::Open {
                dialect: DIALECT,
                location: location.to_string(),
                source: Box::new(source),
            }
        })?;
        if debug {
            conn.trace(Some(log_sql));
        }
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| StorageError::from(err))?;
        }
        Ok(())
    }

    fn migrate_schema(&mut self) -> Result<(), StorageError> {
        schema::migrate(self.conn_mut()?)
    }

    fn is_legacy_schema(&self) -> Result<bool, StorageError> {
        schema::has_legacy_layout(self.conn()?)
    }

    fn fetch_meta(&self) -> Result<FetchMeta, StorageError> {
        let stored = self
            .conn()?
            .query_row(
                "SELECT revision, schema_version FROM fetch_meta WHERE id = 1",
                [],
                |row| {
                    Ok(FetchMeta {
                        revision: row.get(0)?,
                        schema_version: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(stored.unwrap_or_else(|| FetchMeta::for_stamp(&self.stamp)))
    }

    fn upsert_fetch_meta(&mut self, meta: &FetchMeta) -> Result<(), StorageError> {
        let stamped = FetchMeta::for_stamp(&self.stamp);
        debug!(
            previous_revision = %meta.revision,
            previous_schema = meta.schema_version,
            revision = %stamped.revision,
            "stamping fetch meta"
        );
        self.conn()?.execute(
            "INSERT INTO fetch_meta (id, revision, schema_version, created_at, updated_at)
             VALUES (1, ?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'), strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             ON CONFLICT(id) DO UPDATE SET
                 revision = excluded.revision,
                 schema_version = excluded.schema_version,
                 updated_at = excluded.updated_at",
            params![stamped.revision, stamped.schema_version],
        )?;
        Ok(())
    }

    fn ingest(
        &mut self,
        ecosystem: EcosystemType,
        advisories: &[Advisory],
    ) -> Result<(), StorageError> {
        let conn = self.conn_mut()?;
        replace_ecosystem(conn, ecosystem, advisories).map_err(|source| {
            error!(%ecosystem, error = %source, "ingest rolled back");
            StorageError::Ingest {
                ecosystem: ecosystem.to_string(),
                source: Box::new(source),
            }
        })
    }

    fn find_by_id(
        &self,
        id: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        self.find_where(
            "SELECT a.id FROM advisories a
             JOIN advisory_packages p ON p.advisory_id = a.id
             WHERE (a.entry_id = ?1
                    OR a.id IN (SELECT advisory_id FROM advisory_aliases WHERE alias = ?1))
               AND (?2 IS NULL OR p.ecosystem = ?2)
             ORDER BY a.id",
            id,
            ecosystem,
        )
    }

    fn find_by_package(
        &self,
        name: &str,
        ecosystem: Option<&str>,
    ) -> Result<Vec<Advisory>, StorageError> {
        self.find_where(
            "SELECT p.advisory_id FROM advisory_packages p
             WHERE p.name = ?1
               AND (?2 IS NULL OR p.ecosystem = ?2)
             ORDER BY p.advisory_id",
            name,
            ecosystem,
        )
    }
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

fn replace_ecosystem(
    conn: &mut Connection,
    ecosystem: EcosystemType,
    advisories: &[Advisory],
) -> Result<(), StorageError> {
    // IMMEDIATE takes the write lock up front, so contention surfaces here
    // as Locked instead of midway through the deletes.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let old_ids: Vec<i64> = {
        let mut stmt =
            tx.prepare_cached("SELECT advisory_id FROM advisory_packages WHERE ecosystem = ?1")?;
        let rows = stmt.query_map(params![ecosystem.as_str()], |row| row.get(0))?;
        rows.collect::<Result<_, _>>()?
    };
    if !old_ids.is_empty() {
        delete_advisories(&tx, &old_ids)?;
        debug!(%ecosystem, deleted = old_ids.len(), "deleted previous advisories");
    }

    let total = advisories.len();
    let mut inserted = 0;
    for batch in advisories.chunks(INSERT_BATCH_SIZE) {
        for advisory in batch {
            insert_advisory(&tx, advisory)?;
        }
        inserted += batch.len();
        debug!(%ecosystem, inserted, total, "inserted advisory batch");
    }

    tx.commit()?;
    info!(%ecosystem, replaced = old_ids.len(), inserted, "ecosystem replaced");
    Ok(())
}

/// Deletes the given advisories and every row they own, following
/// [`CASCADE_DELETE_ORDER`].
fn delete_advisories(conn: &Connection, ids: &[i64]) -> Result<(), StorageError> {
    for (table, scope) in CASCADE_DELETE_ORDER {
        for chunk in ids.chunks(DELETE_CHUNK_SIZE) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = match scope {
                DeleteScope::ViaAffects => format!(
                    "DELETE FROM {table} WHERE affects_id IN \
                     (SELECT id FROM advisory_affects WHERE advisory_id IN ({placeholders}))"
                ),
                DeleteScope::ByAdvisory => {
                    format!("DELETE FROM {table} WHERE advisory_id IN ({placeholders})")
                }
                DeleteScope::Root => format!("DELETE FROM {table} WHERE id IN ({placeholders})"),
            };
            conn.execute(&sql, params_from_iter(chunk.iter()))?;
        }
    }
    Ok(())
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Inserts one advisory graph, returning the new advisory row id.
fn insert_advisory(conn: &Connection, advisory: &Advisory) -> Result<i64, StorageError> {
    conn.prepare_cached(
        "INSERT INTO advisories (entry_id, published, modified, withdrawn, summary, details, severity) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?
    .execute(params![
        advisory.entry_id,
        format_timestamp(&advisory.published),
        format_timestamp(&advisory.modified),
        format_timestamp(&advisory.withdrawn),
        advisory.summary,
        advisory.details,
        advisory.severity,
    ])?;
    let advisory_id = conn.last_insert_rowid();

    {
        let mut stmt = conn
            .prepare_cached("INSERT INTO advisory_aliases (advisory_id, alias) VALUES (?1, ?2)")?;
        for alias in &advisory.aliases {
            stmt.execute(params![advisory_id, alias.alias])?;
        }
    }

    {
        let mut stmt = conn
            .prepare_cached("INSERT INTO advisory_related (advisory_id, related) VALUES (?1, ?2)")?;
        for related in &advisory.related {
            stmt.execute(params![advisory_id, related.related])?;
        }
    }

    conn.prepare_cached(
        "INSERT INTO advisory_packages (advisory_id, ecosystem, name, purl) VALUES (?1, ?2, ?3, ?4)",
    )?
    .execute(params![
        advisory_id,
        advisory.package.ecosystem,
        advisory.package.name,
        advisory.package.purl,
    ])?;

    conn.prepare_cached("INSERT INTO advisory_affects (advisory_id) VALUES (?1)")?
        .execute(params![advisory_id])?;
    let affects_id = conn.last_insert_rowid();

    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO affects_ranges (affects_id, range_type, repo, introduced, fixed) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for range in &advisory.affects.ranges {
            stmt.execute(params![
                affects_id,
                range.range_type,
                range.repo,
                range.introduced,
                range.fixed,
            ])?;
        }
    }

    {
        let mut stmt = conn
            .prepare_cached("INSERT INTO affects_versions (affects_id, version) VALUES (?1, ?2)")?;
        for version in &advisory.affects.versions {
            stmt.execute(params![affects_id, version.version])?;
        }
    }

    {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO advisory_references (advisory_id, ref_type, url) VALUES (?1, ?2, ?3)",
        )?;
        for reference in &advisory.references {
            stmt.execute(params![advisory_id, reference.ref_type, reference.url])?;
        }
    }

    conn.prepare_cached("INSERT INTO ecosystem_specific (advisory_id) VALUES (?1)")?
        .execute(params![advisory_id])?;
    conn.prepare_cached("INSERT INTO database_specific (advisory_id) VALUES (?1)")?
        .execute(params![advisory_id])?;

    Ok(advisory_id)
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn parse_timestamp(advisory_id: i64, value: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StorageError::IntegrityError {
            reason: format!("advisory row {advisory_id} has invalid timestamp '{value}': {e}"),
        })
}

/// Loads one advisory row and eagerly loads every collection it owns.
fn load_advisory(conn: &Connection, advisory_id: i64) -> Result<Advisory, StorageError> {
    let (entry_id, published, modified, withdrawn, summary, details, severity) = conn
        .prepare_cached(
            "SELECT entry_id, published, modified, withdrawn, summary, details, severity FROM advisories WHERE id = ?1",
        )?
        .query_row(params![advisory_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

    let aliases = {
        let mut stmt = conn
            .prepare_cached("SELECT alias FROM advisory_aliases WHERE advisory_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![advisory_id], |row| Ok(Alias { alias: row.get(0)? }))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let related = {
        let mut stmt = conn.prepare_cached(
            "SELECT related FROM advisory_related WHERE advisory_id = ?1 ORDER BY id",
        )?;
        let rows =
            stmt.query_map(params![advisory_id], |row| Ok(Related { related: row.get(0)? }))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let package = conn
        .prepare_cached("SELECT ecosystem, name, purl FROM advisory_packages WHERE advisory_id = ?1")?
        .query_row(params![advisory_id], |row| {
            Ok(Package {
                ecosystem: row.get(0)?,
                name: row.get(1)?,
                purl: row.get(2)?,
            })
        })
        .optional()?
        .ok_or_else(|| StorageError::IntegrityError {
            reason: format!("advisory {entry_id} has no package row"),
        })?;

    let affects_id: Option<i64> = conn
        .prepare_cached("SELECT id FROM advisory_affects WHERE advisory_id = ?1")?
        .query_row(params![advisory_id], |row| row.get(0))
        .optional()?;
    let affects = match affects_id {
        Some(affects_id) => load_affects(conn, affects_id)?,
        None => Affects::default(),
    };

    let references = {
        let mut stmt = conn.prepare_cached(
            "SELECT ref_type, url FROM advisory_references WHERE advisory_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![advisory_id], |row| {
            Ok(Reference {
                ref_type: row.get(0)?,
                url: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    Ok(Advisory {
        published: parse_timestamp(advisory_id, &published)?,
        modified: parse_timestamp(advisory_id, &modified)?,
        withdrawn: parse_timestamp(advisory_id, &withdrawn)?,
        entry_id,
        aliases,
        related,
        package,
        summary,
        details,
        affects,
        references,
        severity,
        ecosystem_specific: EcosystemSpecific::default(),
        database_specific: DatabaseSpecific::default(),
    })
}

fn load_affects(conn: &Connection, affects_id: i64) -> Result<Affects, StorageError> {
    let ranges = {
        let mut stmt = conn.prepare_cached(
            "SELECT range_type, repo, introduced, fixed FROM affects_ranges WHERE affects_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![affects_id], |row| {
            Ok(AffectedRange {
                range_type: row.get(0)?,
                repo: row.get(1)?,
                introduced: row.get(2)?,
                fixed: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    let versions = {
        let mut stmt = conn.prepare_cached(
            "SELECT version FROM affects_versions WHERE affects_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![affects_id], |row| {
            Ok(AffectedVersion { version: row.get(0)? })
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    Ok(Affects { ranges, versions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use osv_core::{withdrawn_never, LATEST_SCHEMA_VERSION};

    fn advisory(ecosystem: &str, entry_id: &str, package: &str, aliases: &[&str]) -> Advisory {
        Advisory {
            entry_id: entry_id.into(),
            published: Utc.with_ymd_and_hms(2021, 4, 1, 0, 0, 0).unwrap(),
            modified: Utc.with_ymd_and_hms(2021, 6, 1, 12, 30, 0).unwrap(),
            withdrawn: withdrawn_never(),
            aliases: aliases.iter().map(|a| Alias { alias: a.to_string() }).collect(),
            related: vec![Related { related: format!("{entry_id}-related") }],
            package: Package {
                ecosystem: ecosystem.into(),
                name: package.into(),
                purl: format!("pkg:generic/{package}"),
            },
            summary: format!("{package} summary"),
            details: "details".into(),
            affects: Affects {
                ranges: vec![AffectedRange {
                    range_type: "SEMVER".into(),
                    repo: String::new(),
                    introduced: "0.1.0".into(),
                    fixed: "1.0.0".into(),
                }],
                versions: vec![AffectedVersion { version: "0.5.0".into() }],
            },
            references: vec![Reference {
                ref_type: "ADVISORY".into(),
                url: format!("https://example.org/{entry_id}"),
            }],
            severity: String::new(),
            ecosystem_specific: EcosystemSpecific::default(),
            database_specific: DatabaseSpecific::default(),
        }
    }

    fn count(store: &SqliteStore, table: &str) -> i64 {
        store
            .conn()
            .unwrap()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_graph_roundtrips_through_tables() {
        let mut store = SqliteStore::in_memory().unwrap();
        let original = advisory("Go", "GO-2021-0001", "golang.org/x/net", &["CVE-2021-1"]);
        store.ingest(EcosystemType::Go, &[original.clone()]).unwrap();

        let found = store.find_by_id("GO-2021-0001", None).unwrap();
        assert_eq!(found, vec![original]);
    }

    #[test]
    fn test_replace_removes_every_owned_row() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .ingest(
                EcosystemType::Go,
                &[
                    advisory("Go", "GO-1", "a", &["CVE-1"]),
                    advisory("Go", "GO-2", "b", &["CVE-2"]),
                ],
            )
            .unwrap();
        store.ingest(EcosystemType::Go, &[]).unwrap();

        for (table, _) in CASCADE_DELETE_ORDER {
            assert_eq!(count(&store, table), 0, "{table} not emptied");
        }
    }

    #[test]
    fn test_insert_batches_cover_partial_chunk() {
        let mut store = SqliteStore::in_memory().unwrap();
        let advisories: Vec<_> = (0..INSERT_BATCH_SIZE * 2 + 3)
            .map(|i| advisory("PyPI", &format!("PYSEC-{i}"), &format!("pkg{i}"), &[]))
            .collect();
        store.ingest(EcosystemType::PyPi, &advisories).unwrap();
        assert_eq!(count(&store, "advisories"), advisories.len() as i64);
        assert_eq!(count(&store, "ecosystem_specific"), advisories.len() as i64);
    }

    #[test]
    fn test_delete_spans_multiple_id_chunks() {
        let mut store = SqliteStore::in_memory().unwrap();
        let advisories: Vec<_> = (0..DELETE_CHUNK_SIZE + 7)
            .map(|i| advisory("Linux", &format!("LINUX-{i}"), "kernel", &[]))
            .collect();
        store.ingest(EcosystemType::Linux, &advisories).unwrap();
        store
            .ingest(EcosystemType::Linux, &[advisory("Linux", "LINUX-new", "kernel", &[])])
            .unwrap();
        assert_eq!(count(&store, "advisories"), 1);
        assert_eq!(count(&store, "affects_ranges"), 1);
    }

    #[test]
    fn test_fetch_meta_defaults_until_upserted() {
        let mut store = SqliteStore::in_memory().unwrap();
        let meta = store.fetch_meta().unwrap();
        assert_eq!(meta, FetchMeta::for_stamp(&BuildStamp::CURRENT));
        assert_eq!(count(&store, "fetch_meta"), 0);

        store.upsert_fetch_meta(&meta).unwrap();
        store.upsert_fetch_meta(&meta).unwrap();
        assert_eq!(count(&store, "fetch_meta"), 1);
    }

    #[test]
    fn test_upsert_overwrites_stale_version_fields() {
        let stamp = BuildStamp {
            revision: "rev-2",
            schema_version: LATEST_SCHEMA_VERSION,
        };
        let mut store = SqliteStore::with_stamp(stamp);
        store.open(":memory:", false).unwrap();
        store.migrate_schema().unwrap();

        let stale = FetchMeta {
            revision: "rev-1".into(),
            schema_version: 0,
        };
        store.upsert_fetch_meta(&stale).unwrap();

        let stored = store.fetch_meta().unwrap();
        assert_eq!(stored.revision, "rev-2");
        assert_eq!(stored.schema_version, LATEST_SCHEMA_VERSION);
        assert!(!stored.is_outdated());
    }

    #[test]
    fn test_outdated_row_is_reported() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO fetch_meta (id, revision, schema_version, created_at, updated_at) VALUES (1, 'old', 0, '', '')",
                [],
            )
            .unwrap();
        assert!(store.fetch_meta().unwrap().is_outdated());
        match store.check_fetch_meta() {
            Err(StorageError::OutdatedSchema { stored, expected }) => {
                assert_eq!(stored, 0);
                assert_eq!(expected, LATEST_SCHEMA_VERSION);
            }
            other => panic!("expected OutdatedSchema, got: {:?}", other),
        }
    }

    #[test]
    fn test_operations_before_open_fail() {
        let store = SqliteStore::new();
        assert!(matches!(
            store.find_by_id("x", None),
            Err(StorageError::NotOpen { backend: "sqlite3" })
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut never_opened = SqliteStore::new();
        never_opened.close().unwrap();

        let mut store = SqliteStore::in_memory().unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(store.fetch_meta().is_err());
    }

    #[test]
    fn test_empty_entry_id_is_rejected_by_schema() {
        let mut store = SqliteStore::in_memory().unwrap();
        let result = store.ingest(EcosystemType::Go, &[advisory("Go", "", "a", &[])]);
        assert!(matches!(result, Err(StorageError::Ingest { .. })));
    }

    #[test]
    fn test_replace_keeps_records_filed_under_another_package_ecosystem() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .ingest(
                EcosystemType::Linux,
                &[
                    advisory("Linux", "LINUX-A", "kernel", &[]),
                    advisory("Debian", "LINUX-OLD", "openssl", &[]),
                ],
            )
            .unwrap();
        store
            .ingest(EcosystemType::Linux, &[advisory("Linux", "LINUX-B", "kernel", &[])])
            .unwrap();

        assert!(store.find_by_id("LINUX-A", None).unwrap().is_empty());
        let survivors = store.find_by_id("LINUX-OLD", Some("Debian")).unwrap();
        assert_eq!(survivors.len(), 1);
        assert_eq!(count(&store, "advisories"), 2);
    }

    #[test]
    fn test_busy_timeout_is_configurable() {
        let store = SqliteStore::new().with_busy_timeout(Duration::from_millis(50));
        assert_eq!(store.busy_timeout, Duration::from_millis(50));
        assert_eq!(SqliteStore::new().busy_timeout, schema::BUSY_TIMEOUT);
    }
}
