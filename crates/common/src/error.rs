//! Error handling for Linkage
//!
//! This module defines the core error handling infrastructure shared by the
//! Linkage crates. It provides:
//! - `LinkageError` trait for consistent error handling
//! - Specific error types for configuration, persistence and input validation
//! - Integration with `thiserror` for ergonomic error handling
//!
//! # Design Principles
//! - All errors implement Send + Sync for async compatibility
//! - Use thiserror for library errors, anyhow for application errors
//! - Provide clear, actionable error messages

use thiserror::Error;

/// Base trait for all Linkage-specific errors
///
/// This trait ensures all Linkage errors are:
/// - Thread-safe (Send + Sync)
/// - Static lifetime (no borrowed data)
/// - Implement standard Error trait
pub trait LinkageError: std::error::Error + Send + Sync + 'static {}

/// Configuration-related errors
///
/// These errors occur during configuration loading, parsing, or validation.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing failed
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Environment variable error
    #[error("Environment variable error for {var}: {details}")]
    EnvironmentError { var: String, details: String },
}

impl LinkageError for ConfigurationError {}

/// Database and persistence-related errors
///
/// These errors occur while talking to the contact store.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Database connection failed
    #[error("Database connection failed: {source}")]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No pooled connection became available in time
    #[error("Database pool exhausted: {details}")]
    PoolExhausted { details: String },

    /// Database query failed
    #[error("Database query failed during {operation}: {source}")]
    QueryFailed {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Database transaction failed
    #[error("Database transaction failed: {details}")]
    TransactionFailed { details: String },

    /// Database migration failed
    #[error("Database migration failed: {details}")]
    MigrationFailed { details: String },

    /// Stored data could not be decoded
    #[error("Data corruption detected in {location}: {details}")]
    DataCorruption { location: String, details: String },

    /// Constraint violation
    #[error("Database constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    /// Record not found
    #[error("Record not found: {details}")]
    NotFound { details: String },
}

impl LinkageError for PersistenceError {}

/// Validation errors
///
/// These errors occur during input validation or data format checking.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid input format
    #[error("Invalid {field} format: {value}")]
    InvalidFormat { field: String, value: String },

    /// Required field missing
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    /// Field constraint violation
    #[error("Field constraint violation for {field}: {constraint}")]
    ConstraintViolation { field: String, constraint: String },

    /// Invalid enum value
    #[error("Invalid {enum_name} value: {value}")]
    InvalidEnum { enum_name: String, value: String },
}

impl LinkageError for ValidationError {}

impl PersistenceError {
    /// Wrap a driver error raised while performing `operation`
    pub fn query_failed(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::QueryFailed {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Whether retrying the same call later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PersistenceError::ConnectionFailed { .. } | PersistenceError::PoolExhausted { .. }
        )
    }
}

#[cfg(feature = "sqlite")]
impl PersistenceError {
    /// Classify a sqlx error raised while performing `operation`
    pub fn from_sqlx(operation: impl Into<String>, err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::PoolExhausted {
                details: err.to_string(),
            },
            sqlx::Error::RowNotFound => Self::NotFound {
                details: operation.into(),
            },
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Self::ConstraintViolation {
                    constraint: db.message().to_string(),
                }
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => Self::ConnectionFailed {
                source: Box::new(err),
            },
            other => Self::query_failed(operation, other),
        }
    }
}

impl ValidationError {
    /// Shorthand for a missing required field
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Name of the offending input field, when there is one
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::InvalidFormat { field, .. }
            | ValidationError::MissingField { field }
            | ValidationError::ConstraintViolation { field, .. } => Some(field),
            ValidationError::InvalidEnum { .. } => None,
        }
    }
}
