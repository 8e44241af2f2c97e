//! Error types for hoplite-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hoplite-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in hoplite-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    // ========================================================================
    // Vector store errors
    // ========================================================================
    /// Vector store I/O error.
    #[error("Vector store I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// Vector store parse error.
    #[error("Vector store parse error at {path} line {line}: {message}")]
    VectorParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store file not found.
    #[error("Vector store not found at {path}")]
    StoreNotFound { path: PathBuf },

    /// Record failed validation on insert.
    #[error("Vector record rejected: {reason}")]
    InvalidRecord { reason: String },

    // ========================================================================
    // General errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a vector I/O error.
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a vector parse error.
    pub fn vector_parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::VectorParse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
