//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use outbox_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Failures that stop the payments API from starting or serving.
#[derive(Debug, Error)]
pub enum AppError {
    /// `DATABASE_URL`, `HOST` or `PORT` is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The pool could not connect.
    #[error("database unavailable: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Binding or serving the listener failed.
    #[error("listener failed: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
///
/// Server-side failures are logged in full and answered with a generic
/// message so database details never reach the caller.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl ApiError {
    /// Response status and machine-readable code for the wrapped error.
    #[must_use]
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            DomainError::Encoding(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encoding_error"),
            DomainError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let message = if status.is_server_error() {
            tracing::error!(error = %self.0, code = error, "request failed");
            "internal server error".to_owned()
        } else {
            self.0.to_string()
        };

        (status, Json(ErrorBody { error, message })).into_response()
    }
}
