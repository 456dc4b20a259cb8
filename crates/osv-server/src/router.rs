//! Router assembly for the OSV query API.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the axum router with all query routes.
///
/// Identifiers and package names are captured with wildcards because Go
/// module paths contain `/`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Lookup by identifier or alias
        .route("/ids/{*id}", get(handlers::advisories::by_id))
        .route("/{ecosystem}/ids/{*id}", get(handlers::advisories::by_id_in_ecosystem))
        // Lookup by package name
        .route("/pkgs/{*name}", get(handlers::advisories::by_package))
        .route(
            "/{ecosystem}/pkgs/{*name}",
            get(handlers::advisories::by_package_in_ecosystem),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
