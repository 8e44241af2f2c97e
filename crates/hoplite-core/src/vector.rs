//! Dense retrieval: embed the query, ask the vector backend, keep positive matches.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::backend::{Embedder, VectorBackend};
use crate::errors::BackendError;
use crate::types::{Chunk, SearchFilters};

/// One vector match kept for fusion.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// The matched chunk.
    pub chunk: Chunk,
    /// Cosine similarity, always > 0.
    pub similarity: f32,
}

/// Embedder plus vector backend with a checked dimension.
#[derive(Clone)]
pub struct VectorSearcher {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorBackend>,
}

impl std::fmt::Debug for VectorSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearcher")
            .field("embedder", &self.embedder.name())
            .field("backend", &self.backend.name())
            .field("dimension", &self.backend.dimension())
            .finish()
    }
}

impl VectorSearcher {
    /// Pair an embedder with a backend.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DimensionMismatch`] when the declared
    /// dimensions differ.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn VectorBackend>,
    ) -> Result<Self, BackendError> {
        if embedder.dimension() != backend.dimension() {
            return Err(BackendError::DimensionMismatch {
                component: format!("embedder `{}`", embedder.name()),
                expected: backend.dimension(),
                actual: embedder.dimension(),
            });
        }
        Ok(Self { embedder, backend })
    }

    /// The vector backend, shared with the lexical corpus path.
    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Up to `k` chunks with positive similarity, best first.
    ///
    /// Ties break by ascending chunk id. A backend returning fewer than `k`
    /// results is not an error.
    ///
    /// # Errors
    ///
    /// Propagates embedder and backend failures, and rejects an embedding
    /// whose width differs from the backend's.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<VectorHit>, BackendError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embedder.embed(query).await?;
        if embedding.len() != self.backend.dimension() {
            return Err(BackendError::DimensionMismatch {
                component: format!("embedding from `{}`", self.embedder.name()),
                expected: self.backend.dimension(),
                actual: embedding.len(),
            });
        }

        let matches = self.backend.query(&embedding, k, filters).await?;
        let returned = matches.len();

        let mut hits: Vec<VectorHit> = matches
            .into_iter()
            .filter(|m| m.similarity > 0.0 && m.similarity.is_finite())
            .map(|m| VectorHit {
                chunk: m.chunk,
                similarity: m.similarity,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        let mut seen = HashSet::new();
        hits.retain(|h| seen.insert(h.chunk.chunk_id.clone()));
        hits.truncate(k);

        debug!(
            backend = self.backend.name(),
            requested = k,
            returned,
            kept = hits.len(),
            "Vector search complete"
        );
        Ok(hits)
    }
}
