//! Vector store traits and core types.
//!
//! This module defines the core abstraction for chunk vector storage backends.

use crate::error::DbResult;
use serde::{Deserialize, Serialize};

use super::metadata::VectorSearchFilter;

// ============================================================================
// RecordId
// ============================================================================

/// Identifier of a stored chunk vector.
///
/// Chunk ids are opaque strings assigned at ingestion (UUID-shaped in practice).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new record ID.
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Get the underlying ID value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VectorMetric
// ============================================================================

/// Similarity metric for vector search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean (L2) distance, reported negated so higher is better.
    L2,
}

impl VectorMetric {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
            VectorMetric::L2 => "l2",
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VectorMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" => Ok(Self::Dot),
            "l2" => Ok(Self::L2),
            other => Err(format!("Unknown vector metric: {}", other)),
        }
    }
}

// ============================================================================
// VectorInsert
// ============================================================================

/// A chunk vector to insert or update in the store.
///
/// The chunk body (text, header, position, metadata) travels in `payload`;
/// the store only interprets the filterable fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorInsert {
    /// Unique identifier for this chunk.
    pub id: RecordId,

    /// The embedding vector.
    pub vector: Vec<f32>,

    /// JSON payload with the chunk body and metadata.
    pub payload: serde_json::Value,

    /// Document type (e.g., "core-rules", "faq", "errata").
    #[serde(default)]
    pub doc_type: Option<String>,

    /// Source collection or publication the chunk came from.
    #[serde(default)]
    pub source: Option<String>,
}

impl VectorInsert {
    /// Create a new vector insert with required fields.
    pub fn new(id: impl Into<RecordId>, vector: Vec<f32>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
            doc_type: None,
            source: None,
        }
    }

    /// Set the document type.
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Set the source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ============================================================================
// VectorSearchResult
// ============================================================================

/// A single result from a vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// Identifier of the matched chunk.
    pub id: RecordId,

    /// Similarity score (higher is better for every metric).
    pub score: f32,

    /// JSON payload associated with this chunk.
    pub payload: serde_json::Value,
}

impl VectorSearchResult {
    /// Create a new search result.
    pub fn new(id: impl Into<RecordId>, score: f32, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            score,
            payload,
        }
    }
}

/// A stored chunk returned by a corpus scan (no vector, no score).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Identifier of the chunk.
    pub id: RecordId,

    /// JSON payload associated with this chunk.
    pub payload: serde_json::Value,
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Core trait for chunk vector storage backends.
///
/// ## Implementation Notes
///
/// - Backends should be thread-safe (implement `Send + Sync`).
/// - `query` returns results sorted by score (best first), ties by ascending id.
/// - `scan` returns entries in ascending id order.
/// - Upsert semantics: if a record with the same ID exists, it is replaced.
pub trait VectorIndexBackend: Send + Sync {
    /// Query the store for the `limit` most similar chunks.
    fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&VectorSearchFilter>,
    ) -> DbResult<Vec<VectorSearchResult>>;

    /// Enumerate every stored chunk that passes the filter.
    fn scan(&self, filter: Option<&VectorSearchFilter>) -> DbResult<Vec<CorpusEntry>>;

    /// Insert or update chunk vectors.
    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()>;

    /// Get the number of stored records.
    fn len(&self) -> DbResult<usize>;

    /// Check if the store is empty.
    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Get the dimension of vectors in this store.
    fn dimension(&self) -> usize;

    /// Get the similarity metric used by this store.
    fn metric(&self) -> VectorMetric;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id() {
        let id = RecordId::new("chunk-1");
        assert_eq!(id.as_str(), "chunk-1");
        assert_eq!(id.to_string(), "chunk-1");

        let from_str: RecordId = "chunk-2".into();
        assert_eq!(from_str.as_str(), "chunk-2");
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("cosine".parse::<VectorMetric>(), Ok(VectorMetric::Cosine));
        assert_eq!("DOT".parse::<VectorMetric>(), Ok(VectorMetric::Dot));
        assert!("hamming".parse::<VectorMetric>().is_err());
    }

    #[test]
    fn test_vector_insert_builder() {
        let insert = VectorInsert::new("c1", vec![1.0, 0.0], serde_json::json!({}))
            .with_doc_type("faq")
            .with_source("core-book");
        assert_eq!(insert.doc_type.as_deref(), Some("faq"));
        assert_eq!(insert.source.as_deref(), Some("core-book"));
    }

    #[test]
    fn test_vector_insert_serde_camel_case() {
        let insert = VectorInsert::new("c1", vec![0.5], serde_json::json!({"text": "x"}))
            .with_doc_type("rules");
        let json = serde_json::to_value(&insert).unwrap();
        assert_eq!(json["docType"], "rules");
        assert_eq!(json["id"], "c1");
    }
}
