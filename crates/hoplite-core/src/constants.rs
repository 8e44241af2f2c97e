//! Common constants used throughout hoplite-core.
//!
//! Request bounds and retrieval defaults live here so the config layer,
//! request validation and the CLI agree on them.

// ============================================================================
// Directory Names
// ============================================================================

/// The name of the global hoplite configuration directory.
///
/// Located at `~/.hoplite/` on Unix-like systems.
pub const HOPLITE_HOME_DIR: &str = ".hoplite";

/// Config filename inside [`HOPLITE_HOME_DIR`].
pub const CONFIG_FILENAME: &str = "config.yaml";

// ============================================================================
// Request Bounds
// ============================================================================

/// Default number of chunks returned per request.
pub const DEFAULT_MAX_CHUNKS: usize = 5;

/// Upper bound for `max_chunks`.
pub const MAX_CHUNKS_LIMIT: usize = 50;

/// Default relevance gate.
pub const DEFAULT_MIN_RELEVANCE: f32 = 0.45;

/// Default number of follow-up hops.
pub const DEFAULT_MAX_HOPS: usize = 2;

/// Upper bound for `max_hops`.
pub const MAX_HOPS_LIMIT: usize = 3;

// ============================================================================
// Retrieval Defaults
// ============================================================================

/// BM25 term frequency saturation.
pub const DEFAULT_BM25_K1: f32 = 1.5;

/// BM25 document length normalization.
pub const DEFAULT_BM25_B: f32 = 0.75;

/// Reciprocal Rank Fusion constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Vector candidates requested per hop before fusion.
pub const DEFAULT_VECTOR_TOP_K: usize = 50;

/// Lexical candidates kept per hop before fusion.
pub const DEFAULT_LEXICAL_TOP_K: usize = 50;

/// Judge call ceiling when the request has no deadline.
pub const DEFAULT_JUDGE_TIMEOUT_MS: u64 = 30_000;

/// Bounded analytics queue capacity.
pub const DEFAULT_ANALYTICS_QUEUE_CAPACITY: usize = 256;

/// Prefix of the reasoning recorded for a contained judge failure.
pub const JUDGE_FAILED_PREFIX: &str = "judge-failed:";
