//! Chat-completion sufficiency judge.
//!
//! The judge is asked, for a rules question and the evidence gathered so far,
//! whether the evidence suffices. It replies with a JSON object:
//!
//! ```json
//! { "can_answer": false, "reasoning": "...", "missing_query": "dash restrictions" }
//! ```
//!
//! Models sometimes wrap that object in a fenced code block or surround it with
//! prose; [`parse_verdict`] tolerates both.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::JudgeConfig;
use crate::error::{ModelError, ModelResult};

const SYSTEM_PROMPT: &str = "You review evidence retrieved for a tabletop wargame rules question. \
Decide whether the evidence is enough to answer the question accurately. \
Reply with a single JSON object with the keys can_answer (boolean), reasoning (short string) \
and missing_query (string or null). When can_answer is false, missing_query must be a short \
search query for the rule that is still missing.";

// ============================================================================
// Prompt
// ============================================================================

/// One piece of evidence shown to the judge.
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceChunk {
    pub header: String,
    pub text: String,
}

impl EvidenceChunk {
    pub fn new(header: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            text: text.into(),
        }
    }
}

/// Inputs of one judge call.
#[derive(Debug, Clone)]
pub struct JudgePrompt<'a> {
    /// The user's original question.
    pub original_query: &'a str,
    /// 1-based number of the evaluation.
    pub hop_number: usize,
    pub chunks: Vec<EvidenceChunk>,
}

impl JudgePrompt<'_> {
    /// Render `(system, user)` messages, truncating each chunk to
    /// `max_chunk_chars` characters.
    pub fn render(&self, max_chunk_chars: usize) -> (String, String) {
        let mut user = format!(
            "Question: {}\nEvaluation: {}\n\n",
            self.original_query.trim(),
            self.hop_number
        );
        if self.chunks.is_empty() {
            user.push_str("Evidence: none was found.\n");
        } else {
            user.push_str("Evidence:\n");
            for (i, chunk) in self.chunks.iter().enumerate() {
                user.push_str(&format!(
                    "[{}] {}\n{}\n\n",
                    i + 1,
                    chunk.header,
                    truncate_chars(&chunk.text, max_chunk_chars)
                ));
            }
        }
        user.push_str("Respond with the JSON object only.");
        (SYSTEM_PROMPT.to_string(), user)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ============================================================================
// Verdict parsing
// ============================================================================

/// Verdict extracted from the model reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedVerdict {
    #[serde(alias = "canAnswer")]
    pub can_answer: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, alias = "missingQuery")]
    pub missing_query: Option<String>,
}

/// Parse a judge reply into a verdict.
///
/// # Errors
/// Returns [`ModelError::MalformedVerdict`] when no JSON object with a boolean
/// `can_answer` can be found.
pub fn parse_verdict(raw: &str) -> ModelResult<ParsedVerdict> {
    let body = extract_object(raw).ok_or_else(|| ModelError::MalformedVerdict {
        message: format!("no JSON object in reply: {}", truncate_chars(raw.trim(), 80)),
    })?;

    let mut verdict: ParsedVerdict =
        serde_json::from_str(body).map_err(|e| ModelError::MalformedVerdict {
            message: e.to_string(),
        })?;

    verdict.reasoning = verdict.reasoning.trim().to_string();
    verdict.missing_query = verdict
        .missing_query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());
    Ok(verdict)
}

fn extract_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches("json");
            rest.strip_suffix("```").unwrap_or(rest)
        }
        None => trimmed,
    };
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

// ============================================================================
// ChatJudge
// ============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: AssistantMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

/// A parsed verdict plus accounting for the call.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeReply {
    pub verdict: ParsedVerdict,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// `(prompt + completion) / 1000 * costPer1kTokens`.
    pub cost: f64,
}

/// Judge backed by an Ollama-compatible `/api/chat` endpoint.
#[derive(Debug, Clone)]
pub struct ChatJudge {
    client: reqwest::Client,
    config: JudgeConfig,
    endpoint: String,
}

impl ChatJudge {
    /// Build a judge client for `config`.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidConfig`] if the config fails validation or
    /// the HTTP client cannot be constructed.
    pub fn new(config: JudgeConfig) -> ModelResult<Self> {
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

    /// Chat model name.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Configured per-call ceiling.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Ask the model for a verdict, waiting at most `timeout`.
    pub async fn evaluate(&self, prompt: &JudgePrompt<'_>, timeout: Duration) -> ModelResult<JudgeReply> {
        let timeout = timeout.min(self.timeout());
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let (system, user) = prompt.render(self.config.max_chunk_chars);

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(timeout)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::from_reqwest(&self.endpoint, timeout_ms, e))?;
        let verdict = parse_verdict(&parsed.message.content)?;

        let tokens = parsed.prompt_eval_count + parsed.eval_count;
        let cost = tokens as f64 / 1000.0 * self.config.cost_per_1k_tokens;
        debug!(
            model = %self.config.model,
            hop = prompt.hop_number,
            can_answer = verdict.can_answer,
            tokens,
            "Judge replied"
        );

        Ok(JudgeReply {
            verdict,
            prompt_tokens: parsed.prompt_eval_count,
            completion_tokens: parsed.eval_count,
            cost,
        })
    }
}
