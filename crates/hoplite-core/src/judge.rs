//! Sufficiency judge contract.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::errors::JudgeError;
use crate::types::ScoredChunk;

/// What the judge sees for one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct JudgeRequest<'a> {
    /// The user's original question (not the current sub-query).
    pub original_query: &'a str,
    /// Everything accumulated so far, in accumulation order.
    pub chunks: &'a [ScoredChunk],
    /// Zero-based hop that just finished retrieving.
    pub hop_number: usize,
    /// Instant by which the verdict must arrive.
    pub deadline: Instant,
    /// Time allotted to this call.
    pub budget: Duration,
}

/// Structured judge answer.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeVerdict {
    /// Whether the chunks suffice to answer.
    pub can_answer: bool,
    /// Short explanation.
    pub reasoning: String,
    /// Follow-up sub-query when more evidence is needed.
    pub missing_query: Option<String>,
    /// Opaque cost reported by the judge (e.g. token-derived).
    pub cost: f64,
}

impl JudgeVerdict {
    /// A sufficient verdict.
    pub fn sufficient(reasoning: impl Into<String>) -> Self {
        Self {
            can_answer: true,
            reasoning: reasoning.into(),
            missing_query: None,
            cost: 0.0,
        }
    }

    /// An insufficient verdict asking for `missing_query`.
    pub fn needs_more(reasoning: impl Into<String>, missing_query: impl Into<String>) -> Self {
        Self {
            can_answer: false,
            reasoning: reasoning.into(),
            missing_query: Some(missing_query.into()),
            cost: 0.0,
        }
    }

    /// Attach a cost.
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }
}

/// External oracle deciding whether accumulated chunks suffice.
///
/// The engine enforces the budget itself; implementations may also honor
/// `request.budget` on their transport.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Model that produces verdicts.
    fn model_identifier(&self) -> &str;

    /// Evaluate the accumulated chunks.
    async fn evaluate(&self, request: JudgeRequest<'_>) -> Result<JudgeVerdict, JudgeError>;
}
