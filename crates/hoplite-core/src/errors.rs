//! Error types for hoplite-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of [`crate::RetrievalEngine::retrieve`].
///
/// Fail-open recoveries (judge failures, backend failures after hop 0) never
/// reach this type; they are recorded in the context and the logs instead.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The request violated a precondition (e.g. `max_chunks = 0`).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The vector or embedding backend failed before any chunks were collected.
    #[error("Backend failure: {0}")]
    Backend(#[source] BackendError),

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The request deadline was reached.
    #[error("Request deadline exceeded")]
    Timeout,

    /// An engine invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RetrievalError {
    /// Short label for logs and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Backend(_) => "backend",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<BackendError> for RetrievalError {
    fn from(err: BackendError) -> Self {
        Self::Backend(err)
    }
}

/// Failures of the retrieval collaborators (embedder, vector store, corpus).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The embedder could not produce a vector.
    #[error("Embedder `{provider}` failed: {reason}")]
    Embedder {
        /// Embedder name or model id.
        provider: String,
        /// Underlying cause.
        reason: String,
    },

    /// The vector store query failed.
    #[error("Vector backend `{backend}` failed: {reason}")]
    VectorStore {
        /// Backend name.
        backend: String,
        /// Underlying cause.
        reason: String,
    },

    /// Embedder and vector store disagree on dimensionality.
    #[error("Dimension mismatch in {component}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which side produced the wrong width.
        component: String,
        /// Dimension declared by the store.
        expected: usize,
        /// Dimension observed.
        actual: usize,
    },

    /// The corpus could not be enumerated for lexical scoring.
    #[error("Corpus scan failed: {reason}")]
    Corpus {
        /// Underlying cause.
        reason: String,
    },

    /// A stored chunk failed validation at the backend boundary.
    #[error("Chunk `{chunk_id}` rejected: {reason}")]
    InvalidChunk {
        /// Offending chunk id.
        chunk_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Lexical scoring could not complete.
    #[error("Lexical scoring failed: {reason}")]
    Lexical {
        /// Underlying cause.
        reason: String,
    },
}

impl BackendError {
    /// Create an embedder error.
    pub fn embedder(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Embedder {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Create a vector store error.
    pub fn vector_store(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::VectorStore {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Create a corpus scan error.
    pub fn corpus(reason: impl Into<String>) -> Self {
        Self::Corpus {
            reason: reason.into(),
        }
    }
}

/// Failures of the sufficiency judge. Always contained by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    /// The judge did not answer within its budget.
    #[error("timeout after {0} ms")]
    Timeout(u64),

    /// The judge endpoint could not be reached or returned an error status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The judge answered but the verdict could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Configuration loading and validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Failed to read config {path}: {message}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// I/O error text.
        message: String,
    },

    /// The config file could not be parsed.
    #[error("Failed to parse config {path}: {message}")]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },
}

impl ConfigError {
    /// Create an invalid configuration error.
    pub fn invalid(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

/// Keyword library loading errors.
#[derive(Error, Debug)]
pub enum KeywordLibraryError {
    /// The library file could not be read.
    #[error("Keyword library I/O error at {path}: {message}")]
    Io {
        /// Library file path.
        path: PathBuf,
        /// I/O error text.
        message: String,
    },

    /// The library file is not valid JSON for the library schema.
    #[error("Keyword library parse error at {path}: {message}")]
    Parse {
        /// Library file path.
        path: PathBuf,
        /// Parser error text.
        message: String,
    },

    /// The library content is inconsistent.
    #[error("Keyword library invalid: {0}")]
    Invalid(String),
}

/// Analytics sink write errors. Logged by the dispatcher, never surfaced.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The sink could not persist the record.
    #[error("Analytics sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The record could not be serialized.
    #[error("Analytics record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_error_kinds() {
        assert_eq!(RetrievalError::Cancelled.kind(), "cancelled");
        assert_eq!(RetrievalError::Timeout.kind(), "timeout");
        let backend: RetrievalError = BackendError::corpus("disk gone").into();
        assert_eq!(backend.kind(), "backend");
        assert!(backend.to_string().contains("disk gone"));
    }

    #[test]
    fn test_judge_error_display() {
        assert_eq!(JudgeError::Timeout(250).to_string(), "timeout after 250 ms");
        assert!(JudgeError::Malformed("no json".into())
            .to_string()
            .starts_with("malformed response"));
    }

    #[test]
    fn test_config_error_hint() {
        let err = ConfigError::invalid("retrieval.fusion.rrfK must be positive", "Set rrfK to 60");
        assert!(err.to_string().contains("Set rrfK to 60"));
    }
}
