//! Backend selection by configured dialect.

use std::fmt;
use std::str::FromStr;

use tracing::{error, info};

use crate::error::StorageError;
use crate::keyhash::{KeyHashStore, MemoryHashClient, RedisHashClient};
use crate::sqlite::SqliteStore;
use crate::traits::VulnStore;

/// Database dialects a store can be configured with.
///
/// `mysql` and `postgres` are recognized so that configuration errors name
/// them precisely, but no backend exists for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite3,
    Redis,
    Memory,
    Mysql,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite3 => "sqlite3",
            Dialect::Redis => "redis",
            Dialect::Memory => "memory",
            Dialect::Mysql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    /// Whether data written through this dialect outlives the process.
    /// `memory` starts empty on every open.
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Dialect::Memory)
    }

    /// Builds an unopened store for this dialect.
    pub fn new_store(&self) -> Result<Box<dyn VulnStore>, StorageError> {
        match self {
            Dialect::Sqlite3 => Ok(Box::new(SqliteStore::new())),
            Dialect::Redis => Ok(Box::new(KeyHashStore::<RedisHashClient>::new())),
            Dialect::Memory => Ok(Box::new(KeyHashStore::<MemoryHashClient>::new())),
            Dialect::Mysql | Dialect::Postgres => Err(StorageError::UnsupportedDialect {
                dialect: self.as_str().to_string(),
            }),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite3" | "sqlite" => Ok(Dialect::Sqlite3),
            "redis" => Ok(Dialect::Redis),
            "memory" => Ok(Dialect::Memory),
            "mysql" => Ok(Dialect::Mysql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(StorageError::UnsupportedDialect {
                dialect: other.to_string(),
            }),
        }
    }
}

/// Opens a ready-to-use store: construct, connect, reject legacy layouts,
/// then migrate.
pub fn open_store(
    dialect: Dialect,
    location: &str,
    debug: bool,
) -> Result<Box<dyn VulnStore>, StorageError> {
    let mut store = dialect.new_store()?;
    store.open(location, debug)?;

    if store.is_legacy_schema()? {
        error!(%dialect, location, "database uses a legacy schema");
        store.close()?;
        return Err(StorageError::LegacySchema);
    }

    store.migrate_schema()?;
    info!(%dialect, location, "store opened");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dialects() {
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite3);
        assert_eq!("redis".parse::<Dialect>().unwrap(), Dialect::Redis);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(StorageError::UnsupportedDialect { dialect }) if dialect == "oracle"
        ));
    }

    #[test]
    fn test_only_memory_is_ephemeral() {
        assert!(!Dialect::Memory.is_persistent());
        assert!(Dialect::Sqlite3.is_persistent());
        assert!(Dialect::Redis.is_persistent());
    }

    #[test]
    fn test_mysql_and_postgres_are_rejected() {
        for dialect in [Dialect::Mysql, Dialect::Postgres] {
            match open_store(dialect, "db", false) {
                Err(StorageError::UnsupportedDialect { dialect: name }) => {
                    assert_eq!(name, dialect.as_str())
                }
                other => panic!("expected UnsupportedDialect, got: {:?}", other.err()),
            }
        }
    }

    #[test]
    fn test_open_sqlite_in_memory() {
        let store = open_store(Dialect::Sqlite3, ":memory:", false).unwrap();
        assert_eq!(store.name(), "sqlite3");
        assert!(!store.fetch_meta().unwrap().is_outdated());
    }

    #[test]
    fn test_open_memory_hash() {
        let store = open_store(Dialect::Memory, "", true).unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_legacy_sqlite_file_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.sqlite3");
        let path = path.to_str().unwrap();
        {
            let conn = rusqlite::Connection::open(path).unwrap();
            conn.execute_batch("CREATE TABLE cves (id INTEGER PRIMARY KEY);")
                .unwrap();
        }
        let err = open_store(Dialect::Sqlite3, path, false).err().unwrap();
        assert!(matches!(err, StorageError::LegacySchema));
        assert!(err.is_schema_incompatible());
    }

    #[test]
    fn test_unreachable_redis_is_an_open_error() {
        let err = open_store(Dialect::Redis, "redis://127.0.0.1:1/", false)
            .err()
            .unwrap();
        assert!(matches!(err, StorageError::Open { dialect: "redis", .. }));
    }
}
