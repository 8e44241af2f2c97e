//! Domain types for hoplite retrieval.
//!
//! Chunks and their metadata come from the ingestion side and are immutable
//! here. `ScoredChunk`, `HopEvaluation` and `RetrievalContext` are what the
//! engine hands back to the answerer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// ChunkId
// ============================================================================

/// Stable identifier of a chunk (UUID-shaped, but treated as opaque).
///
/// Ordering is lexicographic and is used for every deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    /// Create a new chunk id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// Known chunk metadata plus an overflow map for ingestion extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkMetadata {
    /// Source document identifier.
    pub document_id: String,
    /// Publication or collection the document belongs to.
    pub source: String,
    /// Document type (core rules, FAQ, errata, ...).
    pub doc_type: String,
    /// Original filename.
    pub filename: String,
    /// Section header, duplicated from the chunk for metadata filters.
    pub header: String,
    /// Optional ingestion-time summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Any additional string-valued keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

/// An immutable unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Stable identifier.
    pub chunk_id: ChunkId,
    /// The retrievable body.
    pub text: String,
    /// Nearest ancestor section title.
    pub header: String,
    /// Header depth (2 for `##`, 3 for `###`, ...).
    pub header_level: u8,
    /// Zero-based ordinal within the source document.
    pub position: u32,
    /// Typed metadata.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Minimum header depth produced by the chunker.
    pub const MIN_HEADER_LEVEL: u8 = 2;

    /// Create a chunk with empty metadata (header copied into metadata).
    pub fn new(
        chunk_id: impl Into<ChunkId>,
        header: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        let header = header.into();
        Self {
            chunk_id: chunk_id.into(),
            text: text.into(),
            header: header.clone(),
            header_level: Self::MIN_HEADER_LEVEL,
            position: 0,
            metadata: ChunkMetadata {
                header,
                ..ChunkMetadata::default()
            },
        }
    }

    /// Set the metadata, keeping `metadata.header` in sync with the header.
    pub fn with_metadata(mut self, mut metadata: ChunkMetadata) -> Self {
        if metadata.header.is_empty() {
            metadata.header = self.header.clone();
        }
        self.metadata = metadata;
        self
    }

    /// Set the header level.
    pub fn with_header_level(mut self, level: u8) -> Self {
        self.header_level = level;
        self
    }

    /// Set the position within the source document.
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = position;
        self
    }

    /// Check the structural invariants of a chunk read from a backend.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_id.as_str().trim().is_empty() {
            return Err("chunk id is empty".to_string());
        }
        if self.header_level < Self::MIN_HEADER_LEVEL {
            return Err(format!(
                "header level {} is below {}",
                self.header_level,
                Self::MIN_HEADER_LEVEL
            ));
        }
        Ok(())
    }
}

/// A chunk with its dense vector, as stored in a vector backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The chunk.
    pub chunk: Chunk,
    /// Fixed-width embedding.
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    /// Pair a chunk with its vector.
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

// ============================================================================
// Filters
// ============================================================================

/// Optional metadata restrictions applied to both retrieval paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Restrict to one document type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Restrict to one source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SearchFilters {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict by document type.
    pub fn with_doc_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    /// Restrict by source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// True when no restriction is set.
    pub fn is_empty(&self) -> bool {
        self.doc_type.is_none() && self.source.is_none()
    }

    /// Check a chunk against the filter.
    pub fn matches(&self, chunk: &Chunk) -> bool {
        let doc_type_ok = self
            .doc_type
            .as_ref()
            .map(|d| d == &chunk.metadata.doc_type)
            .unwrap_or(true);
        let source_ok = self
            .source
            .as_ref()
            .map(|s| s == &chunk.metadata.source)
            .unwrap_or(true);
        doc_type_ok && source_ok
    }
}

// ============================================================================
// Retrieval Output
// ============================================================================

fn is_false(value: &bool) -> bool {
    !*value
}

/// A chunk with its fused relevance and discovery hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredChunk {
    /// The chunk.
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Fused relevance in [0, 1].
    pub score: f32,
    /// Zero-based hop at which the chunk first entered accumulation.
    pub hop_number: usize,
    /// Admitted below the relevance gate because nothing else passed.
    #[serde(default, skip_serializing_if = "is_false")]
    pub relaxed: bool,
}

impl ScoredChunk {
    /// Shortcut for the chunk id.
    pub fn chunk_id(&self) -> &ChunkId {
        &self.chunk.chunk_id
    }
}

/// The judge's verdict for one hop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HopEvaluation {
    /// One-based evaluation number (the evaluation after hop 0 is 1).
    pub hop_number: usize,
    /// Whether the accumulated chunks suffice.
    pub can_answer: bool,
    /// Judge explanation, or `judge-failed: <cause>` for contained failures.
    pub reasoning: String,
    /// Follow-up sub-query when another hop is wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_query: Option<String>,
    /// Model that produced the verdict.
    pub model_identifier: String,
}

impl HopEvaluation {
    /// Whether this evaluation records a contained judge failure.
    pub fn is_judge_failure(&self) -> bool {
        self.reasoning
            .starts_with(crate::constants::JUDGE_FAILED_PREFIX)
    }
}

/// Why the hop loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    /// Multi-hop was disabled for the request.
    MultiHopDisabled,
    /// `max_hops` follow-ups were executed.
    HopBudgetExhausted,
    /// The judge declared the context sufficient.
    Sufficient,
    /// The judge asked for more but gave no sub-query.
    NoFollowUp,
    /// The judge failed; its failure was recorded as sufficient.
    JudgeFailed,
    /// A follow-up hop found nothing.
    EmptyHop,
    /// A follow-up hop hit a backend failure.
    BackendFailed,
    /// The judge repeated an earlier query and repeat-stopping is enabled.
    RepeatedQuery,
}

/// Latency and cost aggregated over a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTelemetry {
    /// Wall time spent in lexical + vector retrieval and fusion.
    pub retrieval_latency_ms: u64,
    /// Wall time spent waiting for the judge.
    pub judge_latency_ms: u64,
    /// Sum of judge-reported cost.
    pub judge_cost: f64,
    /// Retrievals executed (hop 0 included).
    pub hops_executed: usize,
}

/// The engine's output for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalContext {
    /// Identifier of this context.
    pub context_id: String,
    /// Identifier of the query that produced it.
    pub query_id: String,
    /// Chunks ordered by (hop ascending, score descending).
    pub chunks: Vec<ScoredChunk>,
    /// Mean score over `chunks`, 0 when empty.
    pub avg_relevance: f32,
    /// Whether the context clears the relevance gate.
    pub meets_threshold: bool,
    /// Judge verdicts in hop order.
    pub hop_evaluations: Vec<HopEvaluation>,
    /// Discovery hop of every accumulated chunk.
    pub chunk_to_hop: BTreeMap<ChunkId, usize>,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Aggregated latency and cost.
    pub telemetry: RetrievalTelemetry,
}

impl RetrievalContext {
    /// True when no chunk was retrieved.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk ids in output order.
    pub fn chunk_ids(&self) -> Vec<&str> {
        self.chunks.iter().map(|c| c.chunk.chunk_id.as_str()).collect()
    }

    /// Compare retrieval content, ignoring identity and telemetry fields.
    pub fn same_retrieval(&self, other: &Self) -> bool {
        self.chunks == other.chunks
            && self.avg_relevance.to_bits() == other.avg_relevance.to_bits()
            && self.meets_threshold == other.meets_threshold
            && self.hop_evaluations == other.hop_evaluations
            && self.chunk_to_hop == other.chunk_to_hop
            && self.stop_reason == other.stop_reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_validate() {
        let chunk = Chunk::new("c1", "Movement", "Each model has a Move characteristic.");
        assert!(chunk.validate().is_ok());

        let shallow = chunk.clone().with_header_level(1);
        assert!(shallow.validate().is_err());

        let anonymous = Chunk::new("  ", "Movement", "text");
        assert!(anonymous.validate().is_err());
    }

    #[test]
    fn test_metadata_overflow_round_trip() {
        let json = serde_json::json!({
            "documentId": "doc-1",
            "source": "core-book",
            "docType": "rules",
            "filename": "core.md",
            "header": "Movement",
            "edition": "3rd",
        });
        let metadata: ChunkMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(metadata.doc_type, "rules");
        assert_eq!(metadata.summary, None);
        assert_eq!(metadata.extra.get("edition").map(String::as_str), Some("3rd"));

        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["edition"], "3rd");
        assert!(back.get("summary").is_none());
    }

    #[test]
    fn test_with_metadata_keeps_header() {
        let chunk = Chunk::new("c1", "Dash", "text").with_metadata(ChunkMetadata {
            doc_type: "rules".into(),
            ..ChunkMetadata::default()
        });
        assert_eq!(chunk.metadata.header, "Dash");
    }

    #[test]
    fn test_filters_match() {
        let chunk = Chunk::new("c1", "Dash", "text").with_metadata(ChunkMetadata {
            doc_type: "faq".into(),
            source: "core-book".into(),
            ..ChunkMetadata::default()
        });
        assert!(SearchFilters::new().matches(&chunk));
        assert!(SearchFilters::new().with_doc_type("faq").matches(&chunk));
        assert!(!SearchFilters::new()
            .with_doc_type("faq")
            .with_source("errata")
            .matches(&chunk));
    }

    #[test]
    fn test_scored_chunk_serializes_flat() {
        let scored = ScoredChunk {
            chunk: Chunk::new("c1", "Dash", "text"),
            score: 1.0,
            hop_number: 0,
            relaxed: false,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["chunkId"], "c1");
        assert_eq!(json["hopNumber"], 0);
        assert!(json.get("relaxed").is_none());
    }

    #[test]
    fn test_judge_failure_marker() {
        let eval = HopEvaluation {
            hop_number: 1,
            can_answer: true,
            reasoning: "judge-failed: timeout after 10 ms".into(),
            missing_query: None,
            model_identifier: "stub".into(),
        };
        assert!(eval.is_judge_failure());
    }
}
