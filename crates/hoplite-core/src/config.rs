//! Configuration types for hoplite.
//!
//! [`EngineConfig`] is the user-level configuration stored in
//! `~/.hoplite/config.yaml`. Every key is optional; a missing file or section
//! yields the defaults below.
//!
//! # Example YAML
//!
//! ```yaml
//! retrieval:
//!   bm25:
//!     k1: 1.2
//!     stemming: true
//!   fusion:
//!     rrfK: 60
//!     normalization: rankCeiling
//!   defaults:
//!     maxChunks: 8
//!     minRelevance: 0.4
//!   stopOnRepeatedQuery: true
//! judge:
//!   model: qwen2.5:7b
//!   timeoutMs: 15000
//! embedder:
//!   model: mxbai-embed-large
//!   dimension: 1024
//! analytics:
//!   enabled: true
//!   logPath: /var/log/hoplite/audit.jsonl
//! keywords:
//!   path: ~/.hoplite/keywords.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hoplite_model::{EmbedderConfig, JudgeConfig, ModelError};

use crate::constants::{
    CONFIG_FILENAME, DEFAULT_ANALYTICS_QUEUE_CAPACITY, DEFAULT_LEXICAL_TOP_K, DEFAULT_MAX_CHUNKS,
    DEFAULT_MAX_HOPS, DEFAULT_MIN_RELEVANCE, DEFAULT_VECTOR_TOP_K, HOPLITE_HOME_DIR,
};
use crate::errors::ConfigError;
use crate::fusion::FusionConfig;
use crate::lexical::Bm25Config;
use crate::request::RetrieveRequest;

// ============================================================================
// EngineConfig
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Retrieval tuning.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Sufficiency judge endpoint.
    #[serde(default)]
    pub judge: JudgeConfig,

    /// Query embedding endpoint.
    #[serde(default)]
    pub embedder: EmbedderConfig,

    /// Audit log.
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Keyword library location.
    #[serde(default)]
    pub keywords: KeywordsConfig,
}

impl EngineConfig {
    /// Load the configuration from the default location (`~/.hoplite/config.yaml`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, parsed
    /// or validated.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// If the file does not exist, returns the default configuration.
    /// Validation warnings are logged.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] for an unusable
    /// file, and [`ConfigError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let config = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        for warning in config.validate()? {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Parse YAML without validating.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] with an empty path.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Render as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })
    }

    /// Get the default config directory (`~/.hoplite`).
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(HOPLITE_HOME_DIR))
    }

    /// Get the default config file path (`~/.hoplite/config.yaml`).
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns the first critical error as [`ConfigError::InvalidConfiguration`].
    ///
    /// # Warnings
    ///
    /// Non-fatal issues are collected and returned. Callers should log them
    /// and proceed.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut all_warnings = Vec::new();

        all_warnings.extend(self.retrieval.validate()?);
        all_warnings.extend(self.judge.validate().map_err(model_config_error)?);
        all_warnings.extend(self.embedder.validate().map_err(model_config_error)?);
        all_warnings.extend(self.analytics.validate()?);

        Ok(all_warnings)
    }
}

fn model_config_error(err: ModelError) -> ConfigError {
    ConfigError::invalid(err.to_string(), "Fix the judge/embedder section of the config")
}

// ============================================================================
// RetrievalConfig
// ============================================================================

/// Retrieval tuning (`retrieval`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalConfig {
    /// Lexical scorer.
    #[serde(default)]
    pub bm25: Bm25Config,

    /// Rank fusion.
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Candidate pool sizes per hop.
    #[serde(default)]
    pub candidates: CandidateConfig,

    /// Defaults applied to new requests.
    #[serde(default)]
    pub defaults: RequestDefaults,

    /// Stop the hop loop when the judge proposes a query already tried.
    /// Default: false (the loop continues and a warning is logged).
    #[serde(default)]
    pub stop_on_repeated_query: bool,
}

impl RetrievalConfig {
    /// Validate the retrieval section.
    ///
    /// # Errors
    ///
    /// Returns the first critical error found.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();
        warnings.extend(self.bm25.validate()?);
        warnings.extend(self.fusion.validate()?);
        warnings.extend(self.candidates.validate()?);
        warnings.extend(self.defaults.validate()?);
        Ok(warnings)
    }
}

/// Candidate pool sizes (`retrieval.candidates`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateConfig {
    /// Vector matches requested per hop.
    /// Default: 50
    #[serde(default = "default_vector_top_k")]
    pub vector_top_k: usize,

    /// Lexical matches kept per hop.
    /// Default: 50
    #[serde(default = "default_lexical_top_k")]
    pub lexical_top_k: usize,
}

fn default_vector_top_k() -> usize {
    DEFAULT_VECTOR_TOP_K
}

fn default_lexical_top_k() -> usize {
    DEFAULT_LEXICAL_TOP_K
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            vector_top_k: default_vector_top_k(),
            lexical_top_k: default_lexical_top_k(),
        }
    }
}

impl CandidateConfig {
    /// Validate candidate pool sizes.
    ///
    /// # Errors
    ///
    /// Returns an error if both pools are zero.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if self.vector_top_k == 0 && self.lexical_top_k == 0 {
            return Err(ConfigError::invalid(
                "retrieval.candidates: vectorTopK and lexicalTopK are both 0",
                "Set at least one candidate pool above 0 (recommended: 50)",
            ));
        }
        if self.vector_top_k == 0 || self.lexical_top_k == 0 {
            warnings.push(
                "retrieval.candidates: one candidate pool is 0; retrieval is no longer hybrid"
                    .to_string(),
            );
        }
        if self.vector_top_k > 500 || self.lexical_top_k > 500 {
            warnings.push(format!(
                "retrieval.candidates: pools of {}/{} are large and slow fusion down",
                self.vector_top_k, self.lexical_top_k
            ));
        }

        Ok(warnings)
    }
}

/// Request defaults (`retrieval.defaults`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDefaults {
    /// Default: 5
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Default: 0.45
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,

    /// Default: 2
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Default: true
    #[serde(default = "default_use_multi_hop")]
    pub use_multi_hop: bool,
}

fn default_max_chunks() -> usize {
    DEFAULT_MAX_CHUNKS
}

fn default_min_relevance() -> f32 {
    DEFAULT_MIN_RELEVANCE
}

fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}

fn default_use_multi_hop() -> bool {
    true
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            max_chunks: default_max_chunks(),
            min_relevance: default_min_relevance(),
            max_hops: default_max_hops(),
            use_multi_hop: default_use_multi_hop(),
        }
    }
}

impl RequestDefaults {
    /// A request for `query` carrying these defaults.
    pub fn request(&self, query: impl Into<String>) -> RetrieveRequest {
        RetrieveRequest::new(query)
            .with_max_chunks(self.max_chunks)
            .with_min_relevance(self.min_relevance)
            .with_max_hops(self.max_hops)
            .with_multi_hop(self.use_multi_hop)
    }

    /// Validate against the request bounds.
    ///
    /// # Errors
    ///
    /// Returns an error if a default would produce an invalid request.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        self.request("probe").validate().map_err(|e| {
            ConfigError::invalid(
                format!("retrieval.defaults: {e}"),
                "Keep maxChunks in 1..=50, minRelevance in 0..=1 and maxHops <= 3",
            )
        })?;

        let mut warnings = Vec::new();
        if self.min_relevance > 0.9 {
            warnings.push(format!(
                "retrieval.defaults.minRelevance={} admits almost nothing but the top chunk",
                self.min_relevance
            ));
        }
        Ok(warnings)
    }
}

// ============================================================================
// AnalyticsConfig
// ============================================================================

/// Audit log configuration (`analytics`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsConfig {
    /// Whether audit records are written.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Records buffered before new ones are dropped.
    /// Default: 256
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// JSONL audit log. Defaults to `~/.hoplite/audit.jsonl` when enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_ANALYTICS_QUEUE_CAPACITY
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: default_queue_capacity(),
            log_path: None,
        }
    }
}

impl AnalyticsConfig {
    /// Validate the analytics section.
    ///
    /// # Errors
    ///
    /// Returns an error if `queueCapacity` is 0.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "analytics.queueCapacity must be greater than 0",
                "Set queueCapacity to a positive value (recommended: 256)",
            ));
        }

        let mut warnings = Vec::new();
        if self.enabled && self.resolved_log_path().is_none() {
            warnings.push(
                "analytics is enabled but no logPath is set and the home directory is unknown"
                    .to_string(),
            );
        }
        Ok(warnings)
    }

    /// Configured log path, or `~/.hoplite/audit.jsonl`.
    pub fn resolved_log_path(&self) -> Option<PathBuf> {
        self.log_path
            .clone()
            .or_else(|| EngineConfig::default_dir().map(|d| d.join("audit.jsonl")))
    }
}

// ============================================================================
// KeywordsConfig
// ============================================================================

/// Keyword library location (`keywords`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordsConfig {
    /// Persisted keyword library (JSON). Without one, only built-in
    /// tokenization applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
