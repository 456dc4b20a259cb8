//! Binary entrypoint for the OSV HTTP server.
//!
//! Reads configuration from environment variables:
//! - `OSV_DBTYPE`: store dialect (default: "sqlite3")
//! - `OSV_DBPATH`: database file path or URL (default: "osv.sqlite3")
//! - `OSV_BIND`: listen address (default: "127.0.0.1")
//! - `OSV_PORT`: listen port (default: "1328")

use std::process;

use osv_server::{serve, ServerConfig};
use osv_storage::{open_store, Dialect};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let dbtype = std::env::var("OSV_DBTYPE").unwrap_or_else(|_| "sqlite3".to_string());
    let dbpath = std::env::var("OSV_DBPATH").unwrap_or_else(|_| "osv.sqlite3".to_string());
    let bind =
        std::env::var("OSV_BIND").unwrap_or_else(|_| ServerConfig::DEFAULT_BIND.to_string());
    let port = match std::env::var("OSV_PORT") {
        Ok(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                tracing::error!("invalid OSV_PORT '{}'", port);
                process::exit(1);
            }
        },
        Err(_) => ServerConfig::DEFAULT_PORT,
    };

    let dialect = match dbtype.parse::<Dialect>() {
        Ok(dialect) if dialect.is_persistent() => dialect,
        Ok(dialect) => {
            tracing::error!("OSV_DBTYPE '{}' would serve an empty store", dialect);
            process::exit(1);
        }
        Err(err) => {
            tracing::error!("{}", err);
            process::exit(1);
        }
    };

    let store = match open_store(dialect, &dbpath, false) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!("failed to open store: {}", err);
            process::exit(3);
        }
    };

    if let Err(err) = serve(ServerConfig { bind, port }, store).await {
        tracing::error!("{}", err);
        process::exit(3);
    }
}
