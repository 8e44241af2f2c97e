//! Collaborator traits consumed by the retrieval engine.
//!
//! Implementations must be internally thread-safe; the engine shares one
//! handle across concurrent requests.

use async_trait::async_trait;

use crate::errors::BackendError;
use crate::types::{Chunk, SearchFilters};

/// Produces fixed-width dense vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embedder name or model id, used in errors and logs.
    fn name(&self) -> &str;

    /// Declared output dimensionality.
    fn dimension(&self) -> usize;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError>;
}

/// One vector store match.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    /// The stored chunk, validated at the backend boundary.
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
}

/// Vector store with corpus enumeration.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Backend name, used in errors and logs.
    fn name(&self) -> &str;

    /// Declared vector dimensionality.
    fn dimension(&self) -> usize;

    /// Up to `k` nearest chunks. May return fewer.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<VectorMatch>, BackendError>;

    /// Every stored chunk matching `filters`, for lexical scoring.
    async fn corpus(&self, filters: Option<&SearchFilters>) -> Result<Vec<Chunk>, BackendError>;
}
