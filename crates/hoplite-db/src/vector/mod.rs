//! Vector store module for hoplite-db.
//!
//! ## Usage
//!
//! ```ignore
//! use hoplite_db::vector::{VectorIndexConfig, open_vector_index};
//!
//! let config = VectorIndexConfig::new(1024, "/path/to/vectors.jsonl");
//! let index = open_vector_index(&config)?;
//!
//! index.upsert(&inserts)?;
//! let results = index.query(&embedding, 10, None)?;
//! let corpus = index.scan(None)?;
//! ```

mod backend;
mod config;
mod metadata;
mod traits;

pub use config::{VectorIndexConfig, DATA_FILENAME};
pub use metadata::VectorSearchFilter;
pub use traits::{
    CorpusEntry, RecordId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};

pub use backend::{cosine_similarity, open_vector_index, MemoryVectorStore};
