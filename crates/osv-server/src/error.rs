//! API error types with HTTP status code mapping.
//!
//! [`ApiError`] is the error type of every handler and renders as a
//! structured JSON body. [`ServeError`] covers server startup.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use osv_storage::StorageError;

/// Structured error detail in API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorDetail {
    /// Machine-readable error code (e.g., "INTERNAL_ERROR").
    pub code: String,
    pub message: String,
}

/// API errors with HTTP status code mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The store is busy with an ingest (503).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", msg),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };

        let body = serde_json::json!({
            "success": false,
            "error": ApiErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        if err.is_locked() {
            ApiError::Unavailable(err.to_string())
        } else {
            ApiError::InternalError(err.to_string())
        }
    }
}

/// Errors that keep the server from starting or running.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_fault_maps_to_500() {
        let response = ApiError::from(StorageError::Backend {
            reason: "gone".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_backend_fault_is_not_unavailable() {
        let err = ApiError::from(StorageError::Backend {
            reason: "redis mutex poisoned".into(),
        });
        assert!(matches!(err, ApiError::InternalError(_)));
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        let response = ApiError::Unavailable("busy".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_schema_error_is_not_unavailable() {
        let err = ApiError::from(StorageError::LegacySchema);
        assert!(matches!(err, ApiError::InternalError(_)));
    }
}
