//! Adapter layer for hoplite-db storage.
//!
//! This module bridges hoplite-db's synchronous vector store with the
//! engine's async [`VectorBackend`] trait. It provides:
//!
//! - Error conversion from `DbError` to [`BackendError`]
//! - The chunk payload format stored alongside each vector
//! - [`DbVectorBackend`], a wrapper that validates chunks read back from the store
//!
//! ## Architecture
//!
//! ```text
//! RetrievalEngine (vector + lexical paths)
//!        ↓
//!   db_adapter (this module) - payload decoding, filters, errors
//!        ↓
//!     hoplite-db (MemoryVectorStore, JSONL persistence)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use hoplite_db::vector::{
    open_vector_index, CorpusEntry, VectorIndexBackend, VectorIndexConfig, VectorInsert,
    VectorSearchFilter, VectorSearchResult,
};
use hoplite_db::DbError;

use crate::backend::{VectorBackend, VectorMatch};
use crate::errors::BackendError;
use crate::types::{Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, SearchFilters};

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a hoplite-db error raised by `backend` to a [`BackendError`].
pub fn from_db_error(backend: &str, err: DbError) -> BackendError {
    match err {
        DbError::DimensionMismatch { expected, actual } => BackendError::DimensionMismatch {
            component: format!("vector store `{backend}`"),
            expected,
            actual,
        },
        DbError::InvalidRecord { reason } => BackendError::InvalidChunk {
            chunk_id: String::new(),
            reason,
        },
        other => BackendError::vector_store(backend, other.to_string()),
    }
}

/// Extension trait to convert `DbResult` into a backend result.
pub trait IntoBackendResult<T> {
    /// Convert, naming the backend in the error.
    fn into_backend_result(self, backend: &str) -> Result<T, BackendError>;
}

impl<T> IntoBackendResult<T> for hoplite_db::DbResult<T> {
    fn into_backend_result(self, backend: &str) -> Result<T, BackendError> {
        self.map_err(|e| from_db_error(backend, e))
    }
}

// ============================================================================
// Payload
// ============================================================================

fn default_header_level() -> u8 {
    Chunk::MIN_HEADER_LEVEL
}

/// Chunk body stored as the vector payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPayload {
    /// Chunk text.
    pub text: String,
    /// Section header the chunk sits under.
    #[serde(default)]
    pub header: String,
    /// Header depth. Default: `Chunk::MIN_HEADER_LEVEL`
    #[serde(default = "default_header_level")]
    pub header_level: u8,
    /// Position of the chunk within its document.
    #[serde(default)]
    pub position: u32,
    /// Document-level metadata used for filtering.
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl ChunkPayload {
    /// Payload for `chunk`.
    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self {
            text: chunk.text.clone(),
            header: chunk.header.clone(),
            header_level: chunk.header_level,
            position: chunk.position,
            metadata: chunk.metadata.clone(),
        }
    }

    /// Rebuild and validate the chunk stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidChunk`] when the payload does not decode
    /// or the chunk breaks its invariants.
    pub fn decode(id: &str, payload: serde_json::Value) -> Result<Chunk, BackendError> {
        let invalid = |reason: String| BackendError::InvalidChunk {
            chunk_id: id.to_string(),
            reason,
        };

        let payload: ChunkPayload =
            serde_json::from_value(payload).map_err(|e| invalid(e.to_string()))?;
        let chunk = Chunk {
            chunk_id: ChunkId::new(id),
            text: payload.text,
            header: payload.header,
            header_level: payload.header_level,
            position: payload.position,
            metadata: ChunkMetadata::default(),
        }
        .with_metadata(payload.metadata);

        chunk.validate().map_err(invalid)?;
        Ok(chunk)
    }
}

/// Convert an embedded chunk to a store insert.
///
/// # Errors
///
/// Returns [`BackendError::InvalidChunk`] if the chunk is invalid or its
/// payload cannot be serialized.
pub fn to_vector_insert(embedded: &EmbeddedChunk) -> Result<VectorInsert, BackendError> {
    let chunk = &embedded.chunk;
    let invalid = |reason: String| BackendError::InvalidChunk {
        chunk_id: chunk.chunk_id.to_string(),
        reason,
    };
    chunk.validate().map_err(invalid)?;

    let payload =
        serde_json::to_value(ChunkPayload::from_chunk(chunk)).map_err(|e| invalid(e.to_string()))?;
    let mut insert = VectorInsert::new(chunk.chunk_id.as_str(), embedded.vector.clone(), payload);
    if !chunk.metadata.doc_type.is_empty() {
        insert = insert.with_doc_type(chunk.metadata.doc_type.clone());
    }
    if !chunk.metadata.source.is_empty() {
        insert = insert.with_source(chunk.metadata.source.clone());
    }
    Ok(insert)
}

/// Convert engine filters to store filters.
pub fn to_db_filter(filters: &SearchFilters) -> VectorSearchFilter {
    VectorSearchFilter {
        doc_type: filters.doc_type.clone(),
        source: filters.source.clone(),
    }
}

// ============================================================================
// DbVectorBackend
// ============================================================================

/// [`VectorBackend`] over any hoplite-db store.
///
/// The in-memory store answers from RAM, so calls run inline on the async
/// task.
#[derive(Clone)]
pub struct DbVectorBackend {
    inner: Arc<dyn VectorIndexBackend>,
    name: String,
}

impl std::fmt::Debug for DbVectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbVectorBackend")
            .field("name", &self.name)
            .field("dimension", &self.inner.dimension())
            .field("metric", &self.inner.metric())
            .finish()
    }
}

impl DbVectorBackend {
    /// Wrap an opened store.
    pub fn new(inner: Arc<dyn VectorIndexBackend>, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: name.into(),
        }
    }

    /// Open a store from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::VectorStore`] if the store cannot be opened.
    pub fn open(config: &VectorIndexConfig) -> Result<Self, BackendError> {
        let name = config
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "memory".to_string());
        let inner = open_vector_index(config).into_backend_result(&name)?;
        Ok(Self::new(inner, name))
    }

    /// Insert or replace embedded chunks; persists for file-backed stores.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidChunk`] or a store error.
    pub fn upsert_chunks(&self, chunks: &[EmbeddedChunk]) -> Result<(), BackendError> {
        let inserts = chunks
            .iter()
            .map(to_vector_insert)
            .collect::<Result<Vec<_>, _>>()?;
        self.inner.upsert(&inserts).into_backend_result(&self.name)
    }

    /// Number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count cannot be read.
    pub fn len(&self) -> Result<usize, BackendError> {
        self.inner.len().into_backend_result(&self.name)
    }

    /// Whether the store holds no chunks.
    ///
    /// # Errors
    ///
    /// Returns a store error if the count cannot be read.
    pub fn is_empty(&self) -> Result<bool, BackendError> {
        Ok(self.len()? == 0)
    }

    fn decode_match(result: VectorSearchResult) -> Result<VectorMatch, BackendError> {
        let chunk = ChunkPayload::decode(result.id.as_str(), result.payload)?;
        Ok(VectorMatch {
            chunk,
            similarity: result.score,
        })
    }

    fn decode_entry(entry: CorpusEntry) -> Result<Chunk, BackendError> {
        ChunkPayload::decode(entry.id.as_str(), entry.payload)
    }
}

#[async_trait]
impl VectorBackend for DbVectorBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<VectorMatch>, BackendError> {
        let filter = filters.map(to_db_filter);
        self.inner
            .query(embedding, k, filter.as_ref())
            .into_backend_result(&self.name)?
            .into_iter()
            .map(Self::decode_match)
            .collect()
    }

    async fn corpus(&self, filters: Option<&SearchFilters>) -> Result<Vec<Chunk>, BackendError> {
        let filter = filters.map(to_db_filter);
        self.inner
            .scan(filter.as_ref())
            .map_err(|e| BackendError::corpus(format!("{}: {e}", self.name)))?
            .into_iter()
            .map(Self::decode_entry)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoplite_db::vector::{MemoryVectorStore, VectorMetric};

    fn embedded(id: &str, header: &str, doc_type: &str, vector: Vec<f32>) -> EmbeddedChunk {
        let chunk = Chunk::new(id, header, format!("{header} rules text"))
            .with_position(3)
            .with_metadata(ChunkMetadata {
                document_id: "core-rules".into(),
                source: "core".into(),
                doc_type: doc_type.into(),
                filename: "core.md".into(),
                ..Default::default()
            });
        EmbeddedChunk::new(chunk, vector)
    }

    fn backend() -> DbVectorBackend {
        let store = MemoryVectorStore::new(3, VectorMetric::Cosine);
        DbVectorBackend::new(Arc::new(store), "test")
    }

    #[test]
    fn test_payload_round_trip_keeps_metadata() {
        let original = embedded("m1", "Movement", "rules", vec![1.0, 0.0, 0.0]);
        let insert = to_vector_insert(&original).unwrap();
        assert_eq!(insert.doc_type.as_deref(), Some("rules"));
        assert_eq!(insert.source.as_deref(), Some("core"));

        let chunk = ChunkPayload::decode("m1", insert.payload).unwrap();
        assert_eq!(chunk, original.chunk);
        assert_eq!(chunk.metadata.header, "Movement");
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        let err = ChunkPayload::decode("x", serde_json::json!({"header": "no text"})).unwrap_err();
        assert!(matches!(err, BackendError::InvalidChunk { ref chunk_id, .. } if chunk_id == "x"));

        let err = ChunkPayload::decode(
            "y",
            serde_json::json!({"text": "t", "headerLevel": 1}),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::InvalidChunk { .. }));
    }

    #[test]
    fn test_dimension_error_maps() {
        let err = from_db_error(
            "store",
            DbError::DimensionMismatch {
                expected: 3,
                actual: 4,
            },
        );
        assert!(matches!(
            err,
            BackendError::DimensionMismatch {
                expected: 3,
                actual: 4,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_query_and_corpus_respect_filters() {
        let backend = backend();
        backend
            .upsert_chunks(&[
                embedded("m1", "Movement", "rules", vec![1.0, 0.0, 0.0]),
                embedded("f1", "Movement FAQ", "faq", vec![0.9, 0.1, 0.0]),
            ])
            .unwrap();
        assert_eq!(backend.len().unwrap(), 2);

        let all = backend.query(&[1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(all[0].chunk.chunk_id.as_str(), "m1");
        assert_eq!(all.len(), 2);

        let faq = SearchFilters::new().with_doc_type("faq");
        let filtered = backend.query(&[1.0, 0.0, 0.0], 10, Some(&faq)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].chunk.chunk_id.as_str(), "f1");

        let corpus = backend.corpus(Some(&faq)).await.unwrap();
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus[0].metadata.doc_type, "faq");
    }

    #[test]
    fn test_upsert_rejects_wrong_dimension() {
        let err = backend()
            .upsert_chunks(&[embedded("m1", "Movement", "rules", vec![1.0, 0.0])])
            .unwrap_err();
        assert!(matches!(err, BackendError::DimensionMismatch { .. }));
    }
}
