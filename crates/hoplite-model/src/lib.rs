//! # hoplite-model
//!
//! Network model adapters for hoplite.
//!
//! - **Embeddings**: [`OllamaEmbedder`] turns query text into dense vectors via
//!   an Ollama-compatible `/api/embed` endpoint.
//! - **Judge**: [`ChatJudge`] asks a chat model whether retrieved rules excerpts
//!   are enough to answer a question, and parses its structured verdict.
//!
//! This crate knows nothing about retrieval. hoplite-core adapts these clients
//! to its `Embedder` and `Judge` traits and converts [`ModelError`] at that seam.
//!
//! ## Usage
//!
//! ```ignore
//! use hoplite_model::{EmbedderConfig, OllamaEmbedder};
//!
//! let embedder = OllamaEmbedder::new(EmbedderConfig::default())?;
//! let vector = embedder.embed("How far can a model charge?").await?;
//! assert_eq!(vector.len(), embedder.dimension());
//! ```

pub mod config;
pub mod error;

mod embedding;
mod judge;

pub use config::{
    EmbedderConfig, JudgeConfig, DEFAULT_BASE_URL, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_JUDGE_MODEL,
};
pub use embedding::OllamaEmbedder;
pub use error::{ModelError, ModelResult};
pub use judge::{parse_verdict, ChatJudge, EvidenceChunk, JudgePrompt, JudgeReply, ParsedVerdict};
