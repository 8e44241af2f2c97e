//! Configuration types for hoplite-model.
//!
//! These are the canonical `embedder` and `judge` config sections; hoplite-core
//! embeds them in its own config file rather than duplicating them.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default Ollama endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default embedding model.
pub const DEFAULT_EMBEDDING_MODEL: &str = "mxbai-embed-large";

/// Dimension of [`DEFAULT_EMBEDDING_MODEL`].
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Default judge model.
pub const DEFAULT_JUDGE_MODEL: &str = "llama3.1:8b";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn check_base_url(section: &str, base_url: &str) -> ModelResult<()> {
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ModelError::invalid_config(format!(
            "{section}.baseUrl must start with http:// or https://, got '{base_url}'"
        )));
    }
    Ok(())
}

// ============================================================================
// EmbedderConfig
// ============================================================================

/// Embedding endpoint configuration (`embedder`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedderConfig {
    /// Server base URL.
    /// Default: http://localhost:11434
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    /// Default: mxbai-embed-large
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Expected vector width; must match the vector store.
    /// Default: 1024
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Per-request timeout.
    /// Default: 10000
    #[serde(default = "default_embed_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_dimension() -> usize {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_embed_timeout_ms() -> u64 {
    10_000
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_ms: default_embed_timeout_ms(),
        }
    }
}

impl EmbedderConfig {
    /// Validate, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] for an empty model, zero
    /// dimension or a non-HTTP base URL.
    pub fn validate(&self) -> ModelResult<Vec<String>> {
        let mut warnings = Vec::new();

        check_base_url("embedder", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(ModelError::invalid_config("embedder.model cannot be empty"));
        }
        if self.dimension == 0 {
            return Err(ModelError::invalid_config(
                "embedder.dimension must be greater than 0",
            ));
        }
        if self.timeout_ms < 100 {
            warnings.push(format!(
                "embedder.timeoutMs={} is very short; embedding calls may fail spuriously",
                self.timeout_ms
            ));
        }

        Ok(warnings)
    }

    /// Endpoint URL for `/api/embed`.
    pub fn endpoint(&self) -> String {
        format!("{}/api/embed", self.base_url.trim_end_matches('/'))
    }
}

// ============================================================================
// JudgeConfig
// ============================================================================

/// Chat judge configuration (`judge`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeConfig {
    /// Server base URL.
    /// Default: http://localhost:11434
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chat model name.
    /// Default: llama3.1:8b
    #[serde(default = "default_judge_model")]
    pub model: String,

    /// Sampling temperature.
    /// Default: 0.0
    #[serde(default)]
    pub temperature: f32,

    /// Ceiling for one judge call; the engine may allot less.
    /// Default: 30000
    #[serde(default = "default_judge_timeout_ms")]
    pub timeout_ms: u64,

    /// Cost reported per 1000 prompt + completion tokens.
    /// Default: 0.0
    #[serde(default)]
    pub cost_per_1k_tokens: f64,

    /// Characters of each chunk included in the prompt.
    /// Default: 1500
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

fn default_judge_model() -> String {
    DEFAULT_JUDGE_MODEL.to_string()
}

fn default_judge_timeout_ms() -> u64 {
    30_000
}

fn default_max_chunk_chars() -> usize {
    1500
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_judge_model(),
            temperature: 0.0,
            timeout_ms: default_judge_timeout_ms(),
            cost_per_1k_tokens: 0.0,
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

impl JudgeConfig {
    /// Validate, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] for an empty model, a zero
    /// timeout, a negative cost or a non-HTTP base URL.
    pub fn validate(&self) -> ModelResult<Vec<String>> {
        let mut warnings = Vec::new();

        check_base_url("judge", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(ModelError::invalid_config("judge.model cannot be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ModelError::invalid_config(
                "judge.timeoutMs must be greater than 0",
            ));
        }
        if self.cost_per_1k_tokens < 0.0 {
            return Err(ModelError::invalid_config(
                "judge.costPer1kTokens cannot be negative",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(format!(
                "judge.temperature={} is outside 0.0..2.0; verdicts may be erratic",
                self.temperature
            ));
        }
        if self.max_chunk_chars < 200 {
            warnings.push(format!(
                "judge.maxChunkChars={} truncates chunks heavily",
                self.max_chunk_chars
            ));
        }

        Ok(warnings)
    }

    /// Endpoint URL for `/api/chat`.
    pub fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EmbedderConfig::default().validate().unwrap().is_empty());
        assert!(JudgeConfig::default().validate().unwrap().is_empty());
    }

    #[test]
    fn test_endpoints() {
        let config = EmbedderConfig {
            base_url: "http://gpu-box:11434/".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint(), "http://gpu-box:11434/api/embed");
        assert_eq!(
            JudgeConfig::default().endpoint(),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn test_invalid_values() {
        let zero_dim = EmbedderConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(zero_dim.validate().is_err());

        let bad_url = JudgeConfig {
            base_url: "localhost:11434".into(),
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());

        let hot = JudgeConfig {
            temperature: 3.0,
            ..Default::default()
        };
        assert_eq!(hot.validate().unwrap().len(), 1);
    }

    #[test]
    fn test_camel_case_keys() {
        let config: JudgeConfig =
            serde_json::from_str(r#"{"model":"qwen2.5:7b","timeoutMs":5000,"costPer1kTokens":0.002}"#)
                .unwrap();
        assert_eq!(config.model, "qwen2.5:7b");
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
