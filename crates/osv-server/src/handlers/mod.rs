//! HTTP handler modules for the query API.
//!
//! Handlers parse the path, acquire the store lock, delegate to the
//! `VulnStore` and return JSON. No lookup logic lives here.

use axum::http::StatusCode;

pub mod advisories;

/// Liveness check with an empty body.
///
/// `GET /health`
pub async fn health() -> StatusCode {
    StatusCode::OK
}
