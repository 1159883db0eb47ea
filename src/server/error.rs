//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`signet_core::Error`] so that route
//! handlers can return `Result<T, AppError>` and use `?` directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError(signet_core::Error);

impl From<signet_core::Error> for AppError {
    fn from(e: signet_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let code = match &self.0 {
            signet_core::Error::NotFound { .. } => "not_found",
            signet_core::Error::Validation(_) => "validation_error",
            signet_core::Error::Conflict(_) => "conflict",
            signet_core::Error::PoolExhausted(_) => "pool_exhausted",
            signet_core::Error::Bootstrap(_) => "bootstrap_error",
            signet_core::Error::Transaction { .. } => "transaction_error",
            signet_core::Error::Database { .. } => "database_error",
            signet_core::Error::Io { .. } => "io_error",
            signet_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
