//! API error types with JSON responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pcm_store::{ErrorKind, StoreError};
use serde::Serialize;

/// API error that can be returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Get the error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Store(e) => match e.kind() {
                ErrorKind::InvalidProjection => "INVALID_PROJECTION",
                ErrorKind::InvalidProductType => "INVALID_PRODUCT_TYPE",
                ErrorKind::InvalidQuery => "INVALID_QUERY",
                ErrorKind::QueryFailure => "QUERY_FAILURE",
                ErrorKind::Config => "STORAGE_ERROR",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Store(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller.
    ///
    /// Unexpected store errors are hidden behind a generic message; query
    /// failures already carry their fixed text.
    fn public_message(&self) -> String {
        match self {
            Self::Store(e) if e.is_validation() => e.to_string(),
            Self::Store(e @ StoreError::QueryFailure { .. }) => e.to_string(),
            Self::Store(_) => "storage error".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorDetails,
}

/// Error details within the response.
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    /// Error code (e.g., "NOT_FOUND", "QUERY_FAILURE").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }
        let body = ErrorResponse {
            error: ErrorDetails {
                code: self.code().to_string(),
                message: self.public_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
