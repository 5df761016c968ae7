//! Common error types for the deep populate service

use thiserror::Error;

/// Common result type for deep populate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the core and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Model identifier not known to the schema provider.
    ///
    /// Indicates a mismatch between a request (or a schema target) and the
    /// deployed schemas. Never retried.
    #[error("Unknown model: {0}")]
    SchemaResolution(String),

    /// Schema file could not be parsed or is structurally invalid
    #[error("Invalid schema {path}: {reason}")]
    InvalidSchema { path: String, reason: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
