//! OSV vulnerability store CLI.
//!
//! Provides the `osv` binary with subcommands to import an ecosystem's feed
//! records into a store, serve the store over HTTP and inspect its fetch
//! metadata. The store backend is picked by `--dbtype`.
//!
//! Exit codes: 0 = success, 1 = usage or feed error, 2 = incompatible
//! schema, 3 = storage or I/O error.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use osv_core::{parse_feed_record, ConvertError, EcosystemType, OsvJson};
use osv_server::{serve, ServerConfig};
use osv_storage::{open_store, Dialect, StorageError, VulnStore};

/// OSV vulnerability store.
#[derive(Parser)]
#[command(name = "osv", about = "Import and serve OSV vulnerability advisories")]
struct Cli {
    /// Database dialect: sqlite3 or redis.
    #[arg(long, env = "OSV_DBTYPE", default_value = "sqlite3", global = true)]
    dbtype: String,

    /// Database file path (sqlite3) or URL (redis).
    #[arg(long, env = "OSV_DBPATH", default_value = "osv.sqlite3", global = true)]
    dbpath: String,

    /// Log every SQL statement.
    #[arg(long, global = true)]
    debug_sql: bool,

    /// Debug-level logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Replace one ecosystem's advisories with the feed files in a directory.
    Import {
        /// Ecosystem tag: crates.io, DWF, Go, Linux, OSS-Fuzz or PyPI.
        ecosystem: String,

        /// Directory of unpacked `<ID>.json` feed files.
        dir: PathBuf,
    },

    /// Start the HTTP query server.
    Server {
        /// Address to bind.
        #[arg(long, env = "OSV_BIND", default_value = ServerConfig::DEFAULT_BIND)]
        bind: String,

        /// Port to listen on.
        #[arg(long, env = "OSV_PORT", default_value_t = ServerConfig::DEFAULT_PORT)]
        port: u16,
    },

    /// Print the store's fetch metadata as JSON.
    Meta,
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let exit_code = match &cli.command {
        Commands::Import { ecosystem, dir } => run_import(&cli, ecosystem, dir),
        Commands::Server { bind, port } => run_server(
            &cli,
            ServerConfig {
                bind: bind.clone(),
                port: *port,
            },
        ),
        Commands::Meta => run_meta(&cli),
    };
    process::exit(exit_code);
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug { "debug" } else { "info" };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if cli.debug_sql {
        if let Ok(directive) = "osv_storage::sql=debug".parse() {
            filter = filter.add_directive(directive);
        }
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Maps a storage failure to an exit code, printing why.
fn storage_failure(context: &str, err: &StorageError) -> i32 {
    if err.is_locked() {
        eprintln!(
            "Error: {}: the database is locked. Close other connections to it and retry.",
            context
        );
        return 3;
    }
    eprintln!("Error: {}: {}", context, err);
    match err {
        StorageError::UnsupportedDialect { .. } => 1,
        _ if err.is_schema_incompatible() => 2,
        _ => 3,
    }
}

fn open(cli: &Cli) -> Result<Box<dyn VulnStore>, i32> {
    let dialect = cli
        .dbtype
        .parse::<Dialect>()
        .map_err(|e| storage_failure("invalid --dbtype", &e))?;
    if !dialect.is_persistent() {
        eprintln!(
            "Error: invalid --dbtype: '{}' keeps nothing after the process exits; use sqlite3 or redis",
            dialect
        );
        return Err(1);
    }
    open_store(dialect, &cli.dbpath, cli.debug_sql).map_err(|e| {
        storage_failure(&format!("failed to open database '{}'", cli.dbpath), &e)
    })
}

/// Why a feed directory could not be read.
#[derive(Debug, thiserror::Error)]
enum FeedDirError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed feed record '{}': {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: ConvertError,
    },
}

impl FeedDirError {
    fn exit_code(&self) -> i32 {
        match self {
            FeedDirError::Io { .. } => 3,
            FeedDirError::Malformed { .. } => 1,
        }
    }
}

/// Reads every `*.json` file in `dir` (sorted by name) as one feed record.
fn read_feed_dir(dir: &Path) -> Result<Vec<OsvJson>, FeedDirError> {
    let dir_error = |source| FeedDirError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(dir_error)? {
        let path = entry.map_err(dir_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = fs::read(path).map_err(|source| FeedDirError::Io {
            path: path.clone(),
            source,
        })?;
        let record = parse_feed_record(&bytes).map_err(|source| FeedDirError::Malformed {
            path: path.clone(),
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Execute the import subcommand.
fn run_import(cli: &Cli, ecosystem: &str, dir: &Path) -> i32 {
    let ecosystem = match ecosystem.parse::<EcosystemType>() {
        Ok(eco) => eco,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let mut store = match open(cli) {
        Ok(store) => store,
        Err(code) => return code,
    };

    let meta = match store.check_fetch_meta() {
        Ok(meta) => meta,
        Err(e) => return storage_failure("cannot import into this database", &e),
    };

    let records = match read_feed_dir(dir) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error: {}", e);
            return e.exit_code();
        }
    };
    if records.is_empty() {
        warn!(dir = %dir.display(), "no feed files found; the ecosystem will be emptied");
    }
    info!(%ecosystem, records = records.len(), "importing feed");

    if let Err(e) = store.ingest_feed(ecosystem, &records) {
        error!(%ecosystem, error = %e, "import failed");
        return match e {
            StorageError::Convert(_) => {
                eprintln!("Error: {}", e);
                1
            }
            _ => storage_failure("import failed", &e),
        };
    }

    if let Err(e) = store.upsert_fetch_meta(&meta) {
        return storage_failure("failed to record fetch metadata", &e);
    }
    if let Err(e) = store.close() {
        return storage_failure("failed to close database", &e);
    }
    info!(%ecosystem, "import finished");
    0
}

/// Execute the server subcommand.
fn run_server(cli: &Cli, config: ServerConfig) -> i32 {
    let store = match open(cli) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {}", e);
            return 3;
        }
    };
    match runtime.block_on(serve(config, store)) {
        Ok(()) => 0,
        Err(osv_server::error::ServeError::Storage(e)) => storage_failure("cannot serve", &e),
        Err(e) => {
            eprintln!("Error: {}", e);
            3
        }
    }
}

/// Execute the meta subcommand.
fn run_meta(cli: &Cli) -> i32 {
    let store = match open(cli) {
        Ok(store) => store,
        Err(code) => return code,
    };
    match store.fetch_meta() {
        Ok(meta) => {
            let json = serde_json::json!({
                "backend": store.name(),
                "revision": meta.revision,
                "schema_version": meta.schema_version,
                "outdated": meta.is_outdated(),
            });
            println!("{}", json);
            0
        }
        Err(e) => storage_failure("failed to read fetch metadata", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("osv").chain(args.iter().copied())).unwrap()
    }

    fn write_record(dir: &Path, id: &str) {
        let body = serde_json::json!({
            "id": id,
            "published": "2021-01-01T00:00:00Z",
            "modified": "2021-01-01T00:00:00Z",
            "package": { "ecosystem": "PyPI", "name": "jinja2" }
        });
        fs::write(dir.join(format!("{id}.json")), body.to_string()).unwrap();
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let parsed = cli(&["meta", "--dbtype", "memory", "--debug-sql"]);
        assert_eq!(parsed.dbtype, "memory");
        assert!(parsed.debug_sql);
        assert!(matches!(parsed.command, Commands::Meta));
    }

    #[test]
    fn test_server_defaults() {
        match cli(&["server"]).command {
            Commands::Server { bind, port } => {
                assert_eq!(bind, "127.0.0.1");
                assert_eq!(port, 1328);
            }
            _ => panic!("expected server subcommand"),
        }
    }

    #[test]
    fn test_read_feed_dir_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        write_record(dir.path(), "PYSEC-2");
        write_record(dir.path(), "PYSEC-1");
        fs::write(dir.path().join("README.md"), "not a record").unwrap();

        let records = read_feed_dir(dir.path()).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["PYSEC-1", "PYSEC-2"]);
    }

    #[test]
    fn test_read_feed_dir_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{").unwrap();
        let err = read_feed_dir(dir.path()).unwrap_err();
        assert!(matches!(err, FeedDirError::Malformed { .. }), "{err}");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_missing_feed_dir_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_feed_dir(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, FeedDirError::Io { .. }), "{err}");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_memory_dialect_is_refused() {
        let feed = tempfile::tempdir().unwrap();
        write_record(feed.path(), "GO-2021-0001");
        let args = cli(&["--dbtype", "memory", "meta"]);

        assert_eq!(run_import(&args, "Go", feed.path()), 1);
        assert_eq!(run_server(&args, ServerConfig::default()), 1);
        assert_eq!(run_meta(&args), 1);
    }

    #[test]
    fn test_import_then_meta_on_sqlite_file() {
        let feed = tempfile::tempdir().unwrap();
        write_record(feed.path(), "PYSEC-2021-66");
        let db = tempfile::tempdir().unwrap();
        let db_path = db.path().join("osv.sqlite3");
        let db_path = db_path.to_str().unwrap();

        let args = cli(&["--dbpath", db_path, "import", "PyPI", "unused"]);
        assert_eq!(run_import(&args, "PyPI", feed.path()), 0);
        assert_eq!(run_meta(&args), 0);

        let store = open_store(Dialect::Sqlite3, db_path, false).unwrap();
        let found = store.find_by_package("jinja2", Some("PyPI")).unwrap();
        assert_eq!(found.len(), 1);
        assert!(!store.check_fetch_meta().unwrap().is_outdated());
    }

    #[test]
    fn test_import_rejects_unknown_ecosystem_and_dialect() {
        let dir = tempfile::tempdir().unwrap();
        let args = cli(&["--dbtype", "memory", "meta"]);
        assert_eq!(run_import(&args, "npm", dir.path()), 1);

        let args = cli(&["--dbtype", "mysql", "meta"]);
        assert_eq!(run_import(&args, "Go", dir.path()), 1);
    }

    #[test]
    fn test_exit_code_for_schema_errors() {
        assert_eq!(storage_failure("ctx", &StorageError::LegacySchema), 2);
        let outdated = StorageError::OutdatedSchema {
            stored: 0,
            expected: 1,
        };
        assert_eq!(storage_failure("ctx", &outdated), 2);
        let missing = StorageError::NotOpen { backend: "sqlite3" };
        assert_eq!(storage_failure("ctx", &missing), 3);
    }
}
