//! Retrieval request and its validation.

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::cancel::CancellationToken;
use crate::constants::{
    DEFAULT_MAX_CHUNKS, DEFAULT_MAX_HOPS, DEFAULT_MIN_RELEVANCE, MAX_CHUNKS_LIMIT, MAX_HOPS_LIMIT,
};
use crate::errors::RetrievalError;
use crate::types::SearchFilters;

/// One retrieval request.
///
/// `deadline` and `cancellation` are control fields; they are not part of the
/// request echo written to analytics.
#[derive(Debug, Clone)]
pub struct RetrieveRequest {
    /// The user question. Must not be blank.
    pub query: String,
    /// Opaque key used to correlate logs and audit records.
    pub context_key: String,
    /// Maximum chunks in the returned context (1..=50).
    pub max_chunks: usize,
    /// Relevance gate (0.0..=1.0).
    pub min_relevance: f32,
    /// Follow-up hops allowed after hop 0 (0..=3).
    pub max_hops: usize,
    /// Whether the judge is consulted at all.
    pub use_multi_hop: bool,
    /// Optional metadata restrictions.
    pub filters: Option<SearchFilters>,
    /// Overall deadline on the tokio clock.
    pub deadline: Option<Instant>,
    /// Cancellation signal.
    pub cancellation: CancellationToken,
}

impl RetrieveRequest {
    /// Create a request with default limits.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_key: String::new(),
            max_chunks: DEFAULT_MAX_CHUNKS,
            min_relevance: DEFAULT_MIN_RELEVANCE,
            max_hops: DEFAULT_MAX_HOPS,
            use_multi_hop: true,
            filters: None,
            deadline: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Set the correlation key.
    pub fn with_context_key(mut self, key: impl Into<String>) -> Self {
        self.context_key = key.into();
        self
    }

    /// Set the chunk limit.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Set the relevance gate.
    pub fn with_min_relevance(mut self, min_relevance: f32) -> Self {
        self.min_relevance = min_relevance;
        self
    }

    /// Set the follow-up hop budget.
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Enable or disable judge consultation.
    pub fn with_multi_hop(mut self, enabled: bool) -> Self {
        self.use_multi_hop = enabled;
        self
    }

    /// Set metadata filters. Empty filters are dropped.
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = if filters.is_empty() {
            None
        } else {
            Some(filters)
        };
        self
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: std::time::Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Attach a caller-owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Follow-up hops that will actually be attempted.
    pub fn effective_max_hops(&self) -> usize {
        if self.use_multi_hop {
            self.max_hops
        } else {
            0
        }
    }

    /// Check request preconditions.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidRequest`] naming the first violated bound.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        if self.max_chunks == 0 || self.max_chunks > MAX_CHUNKS_LIMIT {
            return Err(RetrievalError::InvalidRequest(format!(
                "max_chunks must be in 1..={}, got {}",
                MAX_CHUNKS_LIMIT, self.max_chunks
            )));
        }
        if !(0.0..=1.0).contains(&self.min_relevance) {
            return Err(RetrievalError::InvalidRequest(format!(
                "min_relevance must be in 0.0..=1.0, got {}",
                self.min_relevance
            )));
        }
        if self.max_hops > MAX_HOPS_LIMIT {
            return Err(RetrievalError::InvalidRequest(format!(
                "max_hops must be in 0..={}, got {}",
                MAX_HOPS_LIMIT, self.max_hops
            )));
        }
        Ok(())
    }

    /// Serializable view of the request for audit records.
    pub fn echo(&self) -> RequestEcho {
        RequestEcho {
            query: self.query.clone(),
            context_key: self.context_key.clone(),
            max_chunks: self.max_chunks,
            min_relevance: self.min_relevance,
            max_hops: self.max_hops,
            use_multi_hop: self.use_multi_hop,
            filters: self.filters.clone(),
            had_deadline: self.deadline.is_some(),
        }
    }
}

/// Request fields echoed into audit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEcho {
    /// The user question.
    pub query: String,
    /// Correlation key.
    pub context_key: String,
    /// Chunk limit.
    pub max_chunks: usize,
    /// Relevance gate.
    pub min_relevance: f32,
    /// Follow-up hop budget.
    pub max_hops: usize,
    /// Judge consultation flag.
    pub use_multi_hop: bool,
    /// Metadata filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<SearchFilters>,
    /// Whether a deadline was set.
    pub had_deadline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = RetrieveRequest::new("How far can a model move?");
        assert_eq!(request.max_chunks, 5);
        assert!((request.min_relevance - 0.45).abs() < f32::EPSILON);
        assert_eq!(request.max_hops, 2);
        assert!(request.use_multi_hop);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_rejects_blank_query() {
        let err = RetrieveRequest::new("   ").validate().unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidRequest(_)));
    }

    #[test]
    fn test_rejects_out_of_range_limits() {
        assert!(RetrieveRequest::new("q").with_max_chunks(0).validate().is_err());
        assert!(RetrieveRequest::new("q").with_max_chunks(51).validate().is_err());
        assert!(RetrieveRequest::new("q").with_max_chunks(50).validate().is_ok());
        assert!(RetrieveRequest::new("q").with_min_relevance(1.5).validate().is_err());
        assert!(RetrieveRequest::new("q").with_min_relevance(-0.1).validate().is_err());
        assert!(RetrieveRequest::new("q")
            .with_min_relevance(f32::NAN)
            .validate()
            .is_err());
        assert!(RetrieveRequest::new("q").with_max_hops(4).validate().is_err());
        assert!(RetrieveRequest::new("q").with_max_hops(0).validate().is_ok());
    }

    #[test]
    fn test_effective_max_hops() {
        let request = RetrieveRequest::new("q").with_max_hops(3).with_multi_hop(false);
        assert_eq!(request.effective_max_hops(), 0);
    }

    #[test]
    fn test_empty_filters_are_dropped() {
        let request = RetrieveRequest::new("q").with_filters(SearchFilters::new());
        assert!(request.filters.is_none());

        let echo = RetrieveRequest::new("q")
            .with_filters(SearchFilters::new().with_doc_type("faq"))
            .echo();
        assert_eq!(
            echo.filters.and_then(|f| f.doc_type),
            Some("faq".to_string())
        );
    }
}
