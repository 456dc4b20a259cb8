//! Advisory lookup handlers.
//!
//! Every route answers with a JSON array; no match is `[]`.

use axum::extract::{Path, State};
use axum::Json;
use tracing::{debug, error};

use osv_core::Advisory;

use crate::error::ApiError;
use crate::state::AppState;

async fn lookup_id(
    state: &AppState,
    id: &str,
    ecosystem: Option<&str>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    debug!(id, ?ecosystem, "lookup by id");
    let store = state.store.lock().await;
    let advisories = store.find_by_id(id, ecosystem).map_err(|err| {
        error!(id, error = %err, "lookup by id failed");
        err
    })?;
    Ok(Json(advisories))
}

async fn lookup_package(
    state: &AppState,
    name: &str,
    ecosystem: Option<&str>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    debug!(name, ?ecosystem, "lookup by package");
    let store = state.store.lock().await;
    let advisories = store.find_by_package(name, ecosystem).map_err(|err| {
        error!(name, error = %err, "lookup by package failed");
        err
    })?;
    Ok(Json(advisories))
}

/// `GET /ids/{*id}`
pub async fn by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    lookup_id(&state, &id, None).await
}

/// `GET /{ecosystem}/ids/{*id}`
pub async fn by_id_in_ecosystem(
    State(state): State<AppState>,
    Path((ecosystem, id)): Path<(String, String)>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    lookup_id(&state, &id, Some(&ecosystem)).await
}

/// `GET /pkgs/{*name}`
pub async fn by_package(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    lookup_package(&state, &name, None).await
}

/// `GET /{ecosystem}/pkgs/{*name}`
pub async fn by_package_in_ecosystem(
    State(state): State<AppState>,
    Path((ecosystem, name)): Path<(String, String)>,
) -> Result<Json<Vec<Advisory>>, ApiError> {
    lookup_package(&state, &name, Some(&ecosystem)).await
}
