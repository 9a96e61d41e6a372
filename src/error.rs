// src/error.rs

//! Error types shared by every inventory component

use thiserror::Error;

/// Errors produced by the inventory engine
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed package identity, version or constraint
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Filesystem failure (directory creation, manifest materialization)
    #[error("I/O error: {0}")]
    IoError(String),

    /// Metadata repository miss
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Durable store failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A detection source failed to produce output
    #[error("Scan error: {0}")]
    ScanError(String),

    /// Path escapes its root directory
    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    /// Path is empty or otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
