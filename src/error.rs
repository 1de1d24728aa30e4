//! Error types for the connection locator.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver failures are carried through untouched in [`DbError::Driver`]; the other
//! variants describe conditions raised by this crate itself.

use crate::models::{ConnectionConfigError, Role};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// The underlying driver failed; the sqlx error is passed through as-is.
    #[error(transparent)]
    Driver(#[from] sqlx::Error),

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection not found: {role}:{name}")]
    ConnectionNotFound { role: Role, name: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a connection not found error.
    pub fn connection_not_found(role: Role, name: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            role,
            name: name.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::ConnectionNotFound { .. } => {
                Some("Register a factory under this name before resolving it")
            }
            _ => None,
        }
    }

    /// The wrapped driver error, if this failure came from the driver.
    pub fn as_driver(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConnectionConfigError> for DbError {
    fn from(err: ConnectionConfigError) -> Self {
        DbError::connection(
            err.to_string(),
            "Check the connection name and the URL scheme (postgres, mysql, sqlite)",
        )
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
