//! Vector store backend implementations.
//!
//! - `memory`: ordered in-memory map with optional JSONL persistence

mod memory;

pub use memory::{cosine_similarity, MemoryVectorStore};

use super::config::VectorIndexConfig;
use super::traits::VectorIndexBackend;
use crate::error::DbResult;
use std::sync::Arc;
use tracing::info;

/// Open a vector store with the given configuration.
///
/// # Errors
///
/// Returns an error if the file is missing and `create_if_missing` is false,
/// if it cannot be read, or if stored vectors disagree with the configured dimension.
pub fn open_vector_index(config: &VectorIndexConfig) -> DbResult<Arc<dyn VectorIndexBackend>> {
    let store = MemoryVectorStore::open(config)?;
    info!(
        records = store.len()?,
        dimension = config.dimension,
        metric = %config.metric,
        "Vector store opened"
    );
    Ok(Arc::new(store))
}
