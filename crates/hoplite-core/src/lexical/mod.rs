//! Lexical (BM25) retrieval over a candidate set.
//!
//! ## Architecture
//!
//! ```text
//! query ─┐
//!        ├─► Tokenizer + KeywordLibrary ─► normalized tokens
//! chunks ┘                                      │
//!                                               ▼
//!                                  Bm25Index (per candidate set)
//!                                               │
//!                                               ▼
//!                                  ranked (chunk_id, score, rank)
//! ```
//!
//! - [`tokenizer`]: Unicode word splitting, keyword normalization, filters
//! - [`keywords`]: keyword library snapshot and swap handle
//! - [`index`]: inverted index and search
//! - [`scorer`]: BM25 term scoring (k1=1.5, b=0.75) with clamped IDF

mod index;
pub mod keywords;
mod scorer;
mod tokenizer;

pub use index::{Bm25Index, DocumentStats};
pub use keywords::{
    split_words, KeywordEntry, KeywordLibrary, KeywordLibraryFile, KeywordLibraryHandle,
    KEYWORD_LIBRARY_VERSION,
};
pub use scorer::{bm25_term_score, idf, Bm25Params};
pub use tokenizer::{Tokenizer, TokenizerConfig};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BM25_B, DEFAULT_BM25_K1};
use crate::errors::ConfigError;
use crate::types::{Chunk, ChunkId};

// ============================================================================
// Configuration
// ============================================================================

/// BM25 configuration (`retrieval.bm25`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bm25Config {
    /// Term frequency saturation.
    /// Default: 1.5
    #[serde(default = "default_k1")]
    pub k1: f32,

    /// Document length normalization.
    /// 0 = no length normalization, 1 = full normalization.
    /// Default: 0.75
    #[serde(default = "default_b")]
    pub b: f32,

    /// Whether to stem non-keyword tokens.
    /// Default: false
    #[serde(default)]
    pub stemming: bool,

    /// Whether to remove stop words.
    /// Default: true
    #[serde(default = "default_remove_stopwords")]
    pub remove_stopwords: bool,

    /// Minimum token length to include.
    /// Default: 2
    #[serde(default = "default_min_token_length")]
    pub min_token_length: usize,
}

fn default_k1() -> f32 {
    DEFAULT_BM25_K1
}

fn default_b() -> f32 {
    DEFAULT_BM25_B
}

fn default_remove_stopwords() -> bool {
    true
}

fn default_min_token_length() -> usize {
    2
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            stemming: false,
            remove_stopwords: default_remove_stopwords(),
            min_token_length: default_min_token_length(),
        }
    }
}

impl Bm25Config {
    /// Validates the BM25 configuration, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns an error if `k1` is negative or `b` is outside `0..=1`.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if self.k1.is_nan() || self.k1 < 0.0 {
            return Err(ConfigError::invalid(
                "retrieval.bm25.k1 cannot be negative",
                "Set k1 to a value between 0.5 and 3.0 (recommended: 1.5)",
            ));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(ConfigError::invalid(
                "retrieval.bm25.b must be between 0 and 1",
                "Set b to 0.75 for standard length normalization",
            ));
        }

        if !(0.5..=3.0).contains(&self.k1) {
            warnings.push(format!(
                "retrieval.bm25.k1={} is outside the usual 0.5..3.0 range (recommended: 1.5)",
                self.k1
            ));
        }
        if self.min_token_length == 0 {
            warnings.push(
                "retrieval.bm25.minTokenLength=0 keeps every token; 2 is recommended".to_string(),
            );
        }

        Ok(warnings)
    }

    /// Scoring parameters.
    pub fn params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.k1,
            b: self.b,
        }
    }

    /// Tokenizer settings.
    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig {
            stemming: self.stemming,
            remove_stopwords: self.remove_stopwords,
            min_token_length: self.min_token_length,
        }
    }
}

// ============================================================================
// Scorer
// ============================================================================

/// One lexical match.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    /// Matched chunk.
    pub chunk_id: ChunkId,
    /// BM25 score (never negative).
    pub score: f32,
    /// Rank in the lexical list (1-indexed).
    pub rank: usize,
}

/// BM25 scorer bound to a configuration.
///
/// Stateless across calls; the keyword library snapshot is passed per call so
/// one request sees one library throughout.
#[derive(Debug)]
pub struct LexicalScorer {
    params: Bm25Params,
    tokenizer: Tokenizer,
}

impl LexicalScorer {
    /// Create a scorer.
    pub fn new(config: &Bm25Config) -> Self {
        Self {
            params: config.params(),
            tokenizer: Tokenizer::new(config.tokenizer_config()),
        }
    }

    /// Normalized tokens for `text`.
    pub fn normalize(&self, text: &str, library: &KeywordLibrary) -> Vec<String> {
        self.tokenizer.tokenize(text, library)
    }

    /// Rank `candidates` against `query`, keeping at most `limit` hits.
    ///
    /// Returns an empty list for an empty candidate set or a query with no
    /// tokens left after normalization.
    pub fn score(
        &self,
        query: &str,
        candidates: &[Chunk],
        library: &KeywordLibrary,
        limit: usize,
    ) -> Vec<LexicalHit> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let query_tokens = self.normalize(query, library);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let index = Bm25Index::build(self.params, candidates, &self.tokenizer, library);
        index.search(&query_tokens, limit)
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new(&Bm25Config::default())
    }
}
