//! Error types for the Linkage service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::{LinkageError, PersistenceError, ValidationError};
use serde_json::json;
use thiserror::Error;

use crate::resolution::ResolutionError;

/// Main error type for the Linkage service
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] common::ConfigurationError),

    /// Request body could not be decoded
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Request decoded but failed validation
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Stored contacts break the single-primary invariant
    #[error("Contact data is inconsistent: {message}")]
    Consistency { message: String },

    /// Contact store failure
    #[error("Store error: {0}")]
    Store(#[from] PersistenceError),

    /// Internal server error
    #[error("Internal server error: {message}")]
    Internal { message: String },

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl LinkageError for Error {}

impl From<ResolutionError> for Error {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Validation(e) => Error::Validation(e),
            e @ ResolutionError::ConsistencyViolation { .. } => Error::Consistency {
                message: e.to_string(),
            },
            ResolutionError::Store(e) => Error::Store(e),
        }
    }
}

impl Error {
    /// Get error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config(_) => "LINKAGE_CONFIG_ERROR",
            Error::InvalidRequest { .. } => "LINKAGE_INVALID_REQUEST",
            Error::Validation(_) => "LINKAGE_VALIDATION_ERROR",
            Error::Consistency { .. } => "LINKAGE_CONSISTENCY_VIOLATION",
            Error::Store(PersistenceError::PoolExhausted { .. }) => "LINKAGE_STORE_UNAVAILABLE",
            Error::Store(_) => "LINKAGE_STORE_ERROR",
            Error::Internal { .. } => "LINKAGE_INTERNAL_ERROR",
            Error::Other(_) => "LINKAGE_OTHER_ERROR",
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Store(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Check if error is a client error
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest { .. } | Error::Validation(_))
    }

    /// HTTP status this error is rendered with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRequest { .. } | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Store(PersistenceError::PoolExhausted { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Config(_)
            | Error::Consistency { .. }
            | Error::Store(_)
            | Error::Internal { .. }
            | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "timestamp": chrono::Utc::now(),
                "retryable": self.is_retryable(),
            }
        }));

        (status, body).into_response()
    }
}
