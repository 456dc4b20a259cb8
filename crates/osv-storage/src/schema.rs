//! SQL schema migrations and connection setup for the SQLite backend.
//!
//! Uses `rusqlite_migration` to manage schema migrations via SQLite's
//! `user_version` pragma. Migrations are embedded at compile time via
//! `include_str!`.
//!
//! Opening and migrating are separate steps so that a legacy layout can be
//! detected on the raw file before anything is written to it.

use std::time::Duration;

use rusqlite::Connection;
use rusqlite_migration::{Migrations, M};

use crate::error::StorageError;

/// Default time a statement waits on another connection's lock before the
/// store reports [`StorageError::Locked`].
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// All schema migrations, applied in order via `user_version` tracking.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(include_str!("migrations/001_initial_schema.sql")),
        // Future migrations added here as new M::up(...) entries.
    ])
}

/// Opens (or creates) a SQLite database at `path` with WAL mode, foreign keys
/// and the given busy timeout. No migrations are applied.
pub fn open_connection(path: &str, busy_timeout: Duration) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

fn configure(conn: &Connection, busy_timeout: Duration) -> Result<(), StorageError> {
    conn.busy_timeout(busy_timeout)?;
    // WAL lets lookups proceed while an ingest transaction is open.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    // Foreign key enforcement is off by default in SQLite.
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Applies pending migrations.
pub fn migrate(conn: &mut Connection) -> Result<(), StorageError> {
    migrations()
        .to_latest(conn)
        .map_err(|e| StorageError::Migration(e.to_string()))
}

/// A database is a legacy layout when it already holds tables but has no
/// `fetch_meta` table. Fresh (empty) databases are not legacy.
pub fn has_legacy_layout(conn: &Connection) -> Result<bool, StorageError> {
    let has_fetch_meta: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'fetch_meta')",
        [],
        |row| row.get(0),
    )?;
    if has_fetch_meta {
        return Ok(false);
    }
    let table_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(table_count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn test_fresh_database_is_not_legacy() {
        let conn = open_connection(":memory:", BUSY_TIMEOUT).unwrap();
        assert!(!has_legacy_layout(&conn).unwrap());
    }

    #[test]
    fn test_migrated_database_is_not_legacy() {
        let mut conn = open_connection(":memory:", BUSY_TIMEOUT).unwrap();
        migrate(&mut conn).unwrap();
        assert!(!has_legacy_layout(&conn).unwrap());
    }

    #[test]
    fn test_foreign_tables_without_fetch_meta_are_legacy() {
        let conn = open_connection(":memory:", BUSY_TIMEOUT).unwrap();
        conn.execute_batch("CREATE TABLE cves (id INTEGER PRIMARY KEY, cve_id TEXT);")
            .unwrap();
        assert!(has_legacy_layout(&conn).unwrap());
    }
}
