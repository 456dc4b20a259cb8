//! Server startup.

use tracing::{error, info};

use osv_storage::VulnStore;

use crate::error::ServeError;
use crate::router::build_router;
use crate::state::AppState;

/// Listen address of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl ServerConfig {
    pub const DEFAULT_BIND: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: u16 = 1328;

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: Self::DEFAULT_BIND.to_string(),
            port: Self::DEFAULT_PORT,
        }
    }
}

/// Checks that `store` was written by a compatible build, then serves the
/// query API until the listener fails.
pub async fn serve(config: ServerConfig, store: Box<dyn VulnStore>) -> Result<(), ServeError> {
    let meta = store.check_fetch_meta().map_err(|err| {
        error!(error = %err, "refusing to start on an outdated store");
        err
    })?;
    info!(
        backend = store.name(),
        revision = %meta.revision,
        schema_version = meta.schema_version,
        "store is current"
    );

    let app = build_router(AppState::new(store));
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("osv server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osv_core::{BuildStamp, FetchMeta};
    use osv_storage::{SqliteStore, StorageError};

    #[test]
    fn test_default_address() {
        assert_eq!(ServerConfig::default().addr(), "127.0.0.1:1328");
    }

    #[tokio::test]
    async fn test_outdated_store_is_refused() {
        // A store last written by a build with schema version 0.
        let old_build = BuildStamp {
            revision: "old",
            schema_version: 0,
        };
        let mut store = SqliteStore::with_stamp(old_build);
        store.open(":memory:", false).unwrap();
        store.migrate_schema().unwrap();
        store.upsert_fetch_meta(&FetchMeta::default()).unwrap();

        let err = serve(ServerConfig::default(), Box::new(store))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServeError::Storage(StorageError::OutdatedSchema { stored: 0, .. })
        ));
    }
}
