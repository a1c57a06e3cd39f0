// --- File: crates/lilead_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The error type surfaced by the host process.
///
/// Component crates keep their own error enums and convert into this one at
/// the HTTP boundary.
#[derive(Error, Debug)]
pub enum LileadError {
    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for LileadError {
    fn status_code(&self) -> u16 {
        match self {
            LileadError::ValidationError(_) => 400,
            LileadError::DatabaseError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for LileadError {
    fn from(err: serde_json::Error) -> Self {
        LileadError::ValidationError(err.to_string())
    }
}

// Utility functions for error handling
pub fn validation_error<T: fmt::Display>(message: T) -> LileadError {
    LileadError::ValidationError(message.to_string())
}

pub fn database_error<T: fmt::Display>(message: T) -> LileadError {
    LileadError::DatabaseError(message.to_string())
}
