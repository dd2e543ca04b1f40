//! Custom error types for the gallery service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;

use crate::access::ReasonCode;

/// Request-scoped error taxonomy. No variant is fatal to the process.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed, oversized, or disallowed input
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Capability denied by the access-control gate
    #[error("Access denied: {0}")]
    Authorization(ReasonCode),

    /// Missing session or photo
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Decode, transcode, or watermark failure
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Store write failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Database error from the shared pool layer
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),

    /// Internal server error
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

/// Diagnostic detail is only exposed outside production deployments.
fn include_detail() -> bool {
    static INCLUDE: OnceLock<bool> = OnceLock::new();
    *INCLUDE.get_or_init(|| {
        std::env::var("APP_ENV")
            .map(|env| env != "production")
            .unwrap_or(true)
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authorization(ReasonCode::NotAuthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Processing(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Persistence(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = self.to_string();
        let mut body = json!({
            "success": false,
            "error": message,
        });

        if include_detail() {
            let detail = match &self {
                ApiError::Internal(source) => Some(format!("{source:#}")),
                ApiError::Database(source) => Some(source.to_string()),
                _ => None,
            };
            if let Some(detail) = detail {
                body["detail"] = json!(detail);
            }
        }

        (status, Json(body)).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
