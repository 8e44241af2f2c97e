//! Vector store configuration.

use super::traits::VectorMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default data filename inside a store directory.
pub const DATA_FILENAME: &str = "vectors.jsonl";

// ============================================================================
// VectorIndexConfig
// ============================================================================

/// Configuration for opening a chunk vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    /// Dimension of vectors in the store.
    pub dimension: usize,

    /// JSONL file backing the store. `None` keeps the store memory-only.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Similarity metric.
    #[serde(default)]
    pub metric: VectorMetric,

    /// Whether to start empty if the file does not exist.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_create_if_missing() -> bool {
    true
}

impl VectorIndexConfig {
    /// Create a memory-only config.
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            dimension,
            path: None,
            metric: VectorMetric::Cosine,
            create_if_missing: true,
        }
    }

    /// Create a config backed by a JSONL file.
    ///
    /// A directory path resolves to `<dir>/vectors.jsonl`.
    pub fn new(dimension: usize, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let path = if path.is_dir() {
            path.join(DATA_FILENAME)
        } else {
            path
        };
        Self {
            dimension,
            path: Some(path),
            metric: VectorMetric::Cosine,
            create_if_missing: true,
        }
    }

    /// Set the similarity metric.
    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set whether to start empty if the file is missing.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_resolves_to_data_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VectorIndexConfig::new(4, dir.path());
        assert_eq!(config.path, Some(dir.path().join(DATA_FILENAME)));
    }

    #[test]
    fn test_in_memory_defaults() {
        let config = VectorIndexConfig::in_memory(8).with_metric(VectorMetric::Dot);
        assert!(config.path.is_none());
        assert_eq!(config.metric, VectorMetric::Dot);
        assert!(config.create_if_missing);
    }
}
