//! Reciprocal Rank Fusion and relevance-gated selection.
//!
//! ```text
//! rrf(d) = Σ over lists s containing d at rank r_s: 1 / (k + r_s)
//! ```
//!
//! Ranks are 1-indexed. A chunk found by only one list gets a single term; no
//! penalty rank is invented for the other. Raw scores are normalized into
//! [0, 1] and gated by `min_relevance`, with one relaxed admission when the
//! gate would otherwise empty a hop that both lists had results for.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RRF_K;
use crate::errors::ConfigError;
use crate::lexical::LexicalHit;
use crate::types::ChunkId;
use crate::vector::VectorHit;

// ============================================================================
// Configuration
// ============================================================================

/// How raw RRF scores are mapped into [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreNormalization {
    /// Divide by the best score in the hop; the top chunk scores 1.0.
    #[default]
    MaxObserved,
    /// Divide by the best achievable score (`sources / (k + 1)`), so a chunk
    /// ranked first in every non-empty list scores 1.0 and thresholds are
    /// absolute across queries.
    RankCeiling,
}

/// Fusion configuration (`retrieval.fusion`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    /// RRF k parameter.
    /// Higher values flatten the contribution of rank differences.
    /// Default: 60
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    /// Score normalization.
    /// Default: maxObserved
    #[serde(default)]
    pub normalization: ScoreNormalization,
}

fn default_rrf_k() -> f32 {
    DEFAULT_RRF_K
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            rrf_k: default_rrf_k(),
            normalization: ScoreNormalization::default(),
        }
    }
}

impl FusionConfig {
    /// Validates the fusion configuration, returning warnings for questionable values.
    ///
    /// # Errors
    /// Returns an error if `rrf_k` is not a positive number.
    pub fn validate(&self) -> Result<Vec<String>, ConfigError> {
        let mut warnings = Vec::new();

        if self.rrf_k.is_nan() || self.rrf_k <= 0.0 {
            return Err(ConfigError::invalid(
                "retrieval.fusion.rrfK must be positive",
                "Set rrfK to a positive value (recommended: 60)",
            ));
        }

        if self.rrf_k > 100.0 {
            warnings.push(format!(
                "retrieval.fusion.rrfK={} is very large; rankings will be heavily smoothed (recommended: 60)",
                self.rrf_k
            ));
        }

        Ok(warnings)
    }
}

// ============================================================================
// Fusion
// ============================================================================

/// A chunk after fusion, before or after selection.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedCandidate {
    /// Chunk id.
    pub chunk_id: ChunkId,
    /// Raw RRF score.
    pub rrf_score: f32,
    /// Normalized score in [0, 1].
    pub score: f32,
    /// Rank in the lexical list, if present.
    pub lexical_rank: Option<usize>,
    /// Rank in the vector list, if present.
    pub vector_rank: Option<usize>,
    /// Cosine similarity from the vector list, if present.
    pub vector_similarity: Option<f32>,
    /// Admitted below the gate by relaxation.
    pub relaxed: bool,
}

/// Selection ordering: score desc, then vector similarity desc (absent last),
/// then lexical rank asc (absent last), then chunk id asc.
pub fn selection_order(a: &FusedCandidate, b: &FusedCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| match (a.vector_similarity, b.vector_similarity) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| match (a.lexical_rank, b.lexical_rank) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Fuse a lexical and a vector list.
///
/// The vector list must already be sorted best-first; its rank is position + 1.
/// Output is in selection order. Contributions are summed lexical-first so the
/// same inputs always produce bit-identical scores.
pub fn rrf_fuse(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    config: &FusionConfig,
) -> Vec<FusedCandidate> {
    let k = config.rrf_k;

    let mut by_id: BTreeMap<&ChunkId, FusedCandidate> = BTreeMap::new();

    for hit in lexical {
        let entry = by_id
            .entry(&hit.chunk_id)
            .or_insert_with(|| empty_candidate(&hit.chunk_id));
        // First occurrence wins if a list repeats an id.
        if entry.lexical_rank.is_none() {
            entry.lexical_rank = Some(hit.rank);
        }
    }

    for (index, hit) in vector.iter().enumerate() {
        let id = &hit.chunk.chunk_id;
        let entry = by_id.entry(id).or_insert_with(|| empty_candidate(id));
        if entry.vector_rank.is_none() {
            entry.vector_rank = Some(index + 1);
            entry.vector_similarity = Some(hit.similarity);
        }
    }

    let mut fused: Vec<FusedCandidate> = by_id
        .into_values()
        .map(|mut candidate| {
            let lexical_part = candidate
                .lexical_rank
                .map(|r| 1.0 / (k + r as f32))
                .unwrap_or(0.0);
            let vector_part = candidate
                .vector_rank
                .map(|r| 1.0 / (k + r as f32))
                .unwrap_or(0.0);
            candidate.rrf_score = lexical_part + vector_part;
            candidate
        })
        .collect();

    let denominator = match config.normalization {
        ScoreNormalization::MaxObserved => fused
            .iter()
            .map(|c| c.rrf_score)
            .fold(0.0_f32, f32::max),
        ScoreNormalization::RankCeiling => {
            let sources = usize::from(!lexical.is_empty()) + usize::from(!vector.is_empty());
            sources as f32 / (k + 1.0)
        }
    };

    for candidate in &mut fused {
        candidate.score = if denominator > 0.0 {
            (candidate.rrf_score / denominator).clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    fused.sort_by(selection_order);
    fused
}

fn empty_candidate(id: &ChunkId) -> FusedCandidate {
    FusedCandidate {
        chunk_id: id.clone(),
        rrf_score: 0.0,
        score: 0.0,
        lexical_rank: None,
        vector_rank: None,
        vector_similarity: None,
        relaxed: false,
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Output of the gate and truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Admitted chunks in selection order.
    pub candidates: Vec<FusedCandidate>,
    /// Whether the single admitted chunk came from relaxation.
    pub relaxed: bool,
    /// Size of the fused set before gating.
    pub fused_total: usize,
}

impl Selection {
    /// True when nothing was admitted.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Gate and truncate fused candidates.
///
/// Admits chunks with `score >= min_relevance`, truncated to `max_chunks`.
/// When none pass and both source lists were non-empty, the single best
/// candidate is admitted with `relaxed = true` and its original score.
pub fn select(
    mut candidates: Vec<FusedCandidate>,
    max_chunks: usize,
    min_relevance: f32,
    both_sources_non_empty: bool,
) -> Selection {
    candidates.sort_by(selection_order);
    let fused_total = candidates.len();

    let mut admitted: Vec<FusedCandidate> = candidates
        .iter()
        .filter(|c| c.score >= min_relevance)
        .take(max_chunks)
        .cloned()
        .collect();

    let mut relaxed = false;
    if admitted.is_empty() && both_sources_non_empty && max_chunks > 0 {
        if let Some(top) = candidates.into_iter().next() {
            admitted.push(FusedCandidate {
                relaxed: true,
                ..top
            });
            relaxed = true;
        }
    }

    Selection {
        candidates: admitted,
        relaxed,
        fused_total,
    }
}

/// Fuse both lists and select. The gate relaxes only when both lists are non-empty.
pub fn fuse_and_select(
    lexical: &[LexicalHit],
    vector: &[VectorHit],
    config: &FusionConfig,
    max_chunks: usize,
    min_relevance: f32,
) -> Selection {
    let fused = rrf_fuse(lexical, vector, config);
    let both = !lexical.is_empty() && !vector.is_empty();
    select(fused, max_chunks, min_relevance, both)
}
