//! # hoplite-core
//!
//! Hybrid retrieval engine for a tabletop wargame rules assistant.
//!
//! A question is answered from rulebook chunks found by two retrieval paths,
//! BM25 over keyword-normalized tokens and dense vector similarity. Their
//! rankings are fused with Reciprocal Rank Fusion, gated by a minimum
//! relevance, and optionally expanded over several hops guided by an external
//! judge.
//!
//! ## Main Types
//!
//! - [`RetrievalEngine`] – the multi-hop controller, built with [`RetrievalEngine::builder`]
//! - [`RetrieveRequest`] / [`RetrievalContext`] – request and result
//! - [`RetrievalError`] – the five caller-visible failure kinds
//! - [`EngineConfig`] – YAML configuration (`~/.hoplite/config.yaml`)
//!
//! ## Modules
//!
//! - [`lexical`] – tokenizer, keyword library, BM25 index and scorer
//! - [`vector`] – embed-then-search with positive-similarity filtering
//! - [`fusion`] – RRF, normalization, relevance gate, selection order
//! - [`engine`] – the hop state machine
//! - [`analytics`] – audit records and the bounded dispatcher
//! - [`db_adapter`] / [`model_adapter`] – bridges to hoplite-db and hoplite-model
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hoplite_core::{
//!     DbVectorBackend, EngineConfig, ModelEmbedder, ModelJudge, RetrievalEngine,
//! };
//!
//! let config = EngineConfig::load_default()?;
//! let engine = RetrievalEngine::builder(
//!     Arc::new(ModelEmbedder::from_config(config.embedder.clone())?),
//!     Arc::new(DbVectorBackend::open(&store_config)?),
//!     Arc::new(ModelJudge::from_config(config.judge.clone())?),
//! )
//! .with_config(&config)
//! .build()?;
//!
//! let request = config.retrieval.defaults.request("Can I overwatch after dashing?");
//! let context = engine.retrieve(request).await?;
//! for chunk in &context.chunks {
//!     println!("{} (hop {}) {:.2}", chunk.chunk.header, chunk.hop_number, chunk.score);
//! }
//! ```

// Modules
pub mod analytics;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod constants;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod judge;
pub mod lexical;
pub mod model_adapter;
pub mod request;
pub mod types;
pub mod vector;

// Re-exports for convenience
pub use analytics::{
    AnalyticsDispatcher, AnalyticsSink, AuditOutcome, AuditRecord, AuditTiming, ContextSummary,
    JsonlAuditSink,
};
pub use backend::{Embedder, VectorBackend, VectorMatch};
pub use cancel::CancellationToken;
pub use config::{
    AnalyticsConfig, CandidateConfig, EngineConfig, KeywordsConfig, RequestDefaults,
    RetrievalConfig,
};
pub use db_adapter::{ChunkPayload, DbVectorBackend};
pub use engine::{RetrievalEngine, RetrievalEngineBuilder};
pub use errors::{
    BackendError, ConfigError, JudgeError, KeywordLibraryError, RetrievalError, SinkError,
};
pub use fusion::{FusedCandidate, FusionConfig, ScoreNormalization, Selection};
pub use judge::{Judge, JudgeRequest, JudgeVerdict};
pub use lexical::{
    Bm25Config, KeywordEntry, KeywordLibrary, KeywordLibraryFile, KeywordLibraryHandle,
    LexicalHit, LexicalScorer,
};
pub use model_adapter::{ModelEmbedder, ModelJudge};
pub use request::{RequestEcho, RetrieveRequest};
pub use types::{
    Chunk, ChunkId, ChunkMetadata, EmbeddedChunk, HopEvaluation, RetrievalContext,
    RetrievalTelemetry, ScoredChunk, SearchFilters, StopReason,
};
pub use vector::{VectorHit, VectorSearcher};
