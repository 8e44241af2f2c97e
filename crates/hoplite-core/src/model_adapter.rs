//! Adapter layer for hoplite-model clients.
//!
//! This module bridges hoplite-model's HTTP clients with the engine's
//! collaborator traits. It provides:
//!
//! - Error conversion from `ModelError` to [`BackendError`] and [`JudgeError`]
//! - [`ModelEmbedder`], an [`Embedder`] over `OllamaEmbedder`
//! - [`ModelJudge`], a [`Judge`] over `ChatJudge`
//!
//! ## Architecture
//!
//! ```text
//! RetrievalEngine (vector path, hop evaluation)
//!        ↓
//!   model_adapter (this module) - wrappers + conversions
//!        ↓
//!     hoplite-model (Ollama embed + chat endpoints)
//! ```

use async_trait::async_trait;

use hoplite_model::{
    ChatJudge, EmbedderConfig, EvidenceChunk, JudgeConfig, JudgePrompt, ModelError, OllamaEmbedder,
};

use crate::backend::Embedder;
use crate::errors::{BackendError, JudgeError};
use crate::judge::{Judge, JudgeRequest, JudgeVerdict};

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a hoplite-model error raised by `provider` to a [`BackendError`].
pub fn from_model_error(provider: &str, err: ModelError) -> BackendError {
    match err {
        ModelError::DimensionMismatch {
            model,
            expected,
            actual,
        } => BackendError::DimensionMismatch {
            component: format!("embedding from `{model}`"),
            expected,
            actual,
        },
        other => BackendError::embedder(provider, other.to_string()),
    }
}

/// Convert a hoplite-model error raised during a judge call.
pub fn to_judge_error(err: ModelError) -> JudgeError {
    match err {
        ModelError::Timeout { timeout_ms, .. } => JudgeError::Timeout(timeout_ms),
        ModelError::MalformedVerdict { message } => JudgeError::Malformed(message),
        ModelError::Decode { message, .. } => JudgeError::Malformed(message),
        ModelError::Json(e) => JudgeError::Malformed(e.to_string()),
        other => JudgeError::Transport(other.to_string()),
    }
}

// ============================================================================
// ModelEmbedder
// ============================================================================

/// [`Embedder`] backed by an Ollama-compatible embedding endpoint.
#[derive(Debug, Clone)]
pub struct ModelEmbedder {
    inner: OllamaEmbedder,
}

impl ModelEmbedder {
    /// Wrap an existing client.
    pub fn new(inner: OllamaEmbedder) -> Self {
        Self { inner }
    }

    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Embedder`] if the config is invalid.
    pub fn from_config(config: EmbedderConfig) -> Result<Self, BackendError> {
        let model = config.model.clone();
        OllamaEmbedder::new(config)
            .map(Self::new)
            .map_err(|e| from_model_error(&model, e))
    }
}

#[async_trait]
impl Embedder for ModelEmbedder {
    fn name(&self) -> &str {
        self.inner.model()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        self.inner
            .embed(text)
            .await
            .map_err(|e| from_model_error(self.inner.model(), e))
    }
}

// ============================================================================
// ModelJudge
// ============================================================================

/// [`Judge`] backed by a chat-completion endpoint.
#[derive(Debug, Clone)]
pub struct ModelJudge {
    inner: ChatJudge,
}

impl ModelJudge {
    /// Wrap an existing client.
    pub fn new(inner: ChatJudge) -> Self {
        Self { inner }
    }

    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns [`JudgeError::Transport`] if the config is invalid.
    pub fn from_config(config: JudgeConfig) -> Result<Self, JudgeError> {
        ChatJudge::new(config).map(Self::new).map_err(to_judge_error)
    }
}

/// Prompt inputs for one judge request.
pub fn to_prompt<'a>(request: &JudgeRequest<'a>) -> JudgePrompt<'a> {
    JudgePrompt {
        original_query: request.original_query,
        hop_number: request.hop_number + 1,
        chunks: request
            .chunks
            .iter()
            .map(|c| EvidenceChunk::new(c.chunk.header.clone(), c.chunk.text.clone()))
            .collect(),
    }
}

#[async_trait]
impl Judge for ModelJudge {
    fn model_identifier(&self) -> &str {
        self.inner.model()
    }

    async fn evaluate(&self, request: JudgeRequest<'_>) -> Result<JudgeVerdict, JudgeError> {
        let prompt = to_prompt(&request);
        let reply = self
            .inner
            .evaluate(&prompt, request.budget)
            .await
            .map_err(to_judge_error)?;

        Ok(JudgeVerdict {
            can_answer: reply.verdict.can_answer,
            reasoning: reply.verdict.reasoning,
            missing_query: reply.verdict.missing_query,
            cost: reply.cost,
        })
    }
}
