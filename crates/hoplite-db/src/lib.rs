//! # hoplite-db
//!
//! Storage layer for hoplite: the chunk vector store and corpus scans.
//!
//! Keeping storage out of `hoplite-core` lets the retrieval engine be tested
//! against scripted backends and lets stores be swapped without touching the
//! hop controller.
//!
//! ## Architecture
//!
//! ```text
//! hoplite-cli → hoplite-core → (async collaborator traits)
//!                    ↑
//!               hoplite-db (implements the vector store)
//!               hoplite-model (implements embedder + judge clients)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use hoplite_db::vector::{VectorIndexConfig, open_vector_index};
//!
//! let index = open_vector_index(&VectorIndexConfig::new(1024, "store.jsonl"))?;
//! let results = index.query(&embedding, 10, None)?;
//! ```

pub mod error;
pub mod vector;

pub use error::{DbError, DbResult};
