//! Ollama embedding client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EmbedderConfig;
use crate::error::{ModelError, ModelResult};

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Embeds text through an Ollama-compatible `/api/embed` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    config: EmbedderConfig,
    endpoint: String,
}

impl OllamaEmbedder {
    /// Build a client for `config`.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] if the config fails validation or
    /// the HTTP client cannot be constructed.
    pub fn new(config: EmbedderConfig) -> ModelResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ModelError::invalid_config(format!("HTTP client: {e}")))?;
        let endpoint = config.endpoint();
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    /// Model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Configured vector width.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> ModelResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text]).await?;
        vectors.pop().ok_or_else(|| ModelError::Decode {
            endpoint: self.endpoint.clone(),
            message: "response contained no embeddings".to_string(),
        })
    }

    /// Embed several texts in one request, preserving order.
    pub async fn embed_batch(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.config.model,
            input: texts.to_vec(),
        };
        let timeout_ms = self.config.timeout_ms;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::from_reqwest(&self.endpoint, timeout_ms, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ModelError::from_reqwest(&self.endpoint, timeout_ms, e))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(ModelError::Decode {
                endpoint: self.endpoint.clone(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    parsed.embeddings.len()
                ),
            });
        }
        for vector in &parsed.embeddings {
            if vector.len() != self.config.dimension {
                return Err(ModelError::DimensionMismatch {
                    model: self.config.model.clone(),
                    expected: self.config.dimension,
                    actual: vector.len(),
                });
            }
        }

        debug!(
            model = %self.config.model,
            count = texts.len(),
            "Embedded batch"
        );
        Ok(parsed.embeddings)
    }
}
