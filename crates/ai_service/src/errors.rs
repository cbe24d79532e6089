//! Service error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use churnlens_ai_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while configuring or running the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to load artifacts: {0}")]
    Artifacts(#[source] CoreError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP error rendered as `{"error": message}`
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingColumns(_) | CoreError::Csv(_) => Self::bad_request(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::internal(err.to_string())
    }
}
