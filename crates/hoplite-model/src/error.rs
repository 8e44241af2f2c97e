//! Error types for hoplite-model.

use thiserror::Error;

/// Result type alias for hoplite-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur when talking to a model endpoint.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Adapter configuration is unusable.
    #[error("Invalid model configuration: {message}")]
    InvalidConfig { message: String },

    /// The endpoint could not be reached.
    #[error("Request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    /// The endpoint answered with a non-success status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("Unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    /// The embedding width differs from the configured dimension.
    #[error("Embedding from '{model}' has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// The judge reply did not contain a usable verdict.
    #[error("Malformed judge verdict: {message}")]
    MalformedVerdict { message: String },

    /// The request exceeded its timeout.
    #[error("Request to {endpoint} timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Create an invalid config error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify a reqwest failure for `endpoint`.
    pub fn from_reqwest(endpoint: &str, timeout_ms: u64, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else if err.is_decode() {
            Self::Decode {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        } else {
            Self::Transport {
                endpoint: endpoint.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Whether the error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ModelError::Status {
            endpoint: "http://localhost:11434/api/chat".into(),
            status: 503,
            body: "loading model".into(),
        };
        assert!(err.to_string().contains("503"));

        let err = ModelError::Timeout {
            endpoint: "judge".into(),
            timeout_ms: 250,
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("250 ms"));
    }
}
