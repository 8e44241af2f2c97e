//! Per-request audit records and their fire-and-forget dispatch.
//!
//! The engine assembles one [`AuditRecord`] when a request finishes, whatever
//! the outcome, and hands it to [`AnalyticsDispatcher::submit`]. Submission
//! never blocks: a full queue drops the record and counts the drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::SinkError;
use crate::request::RequestEcho;
use crate::types::{HopEvaluation, RetrievalContext, RetrievalTelemetry, StopReason};

// ============================================================================
// AuditRecord
// ============================================================================

/// How a request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuditOutcome {
    /// A context was returned.
    Completed,
    /// The caller cancelled.
    Cancelled,
    /// The deadline expired.
    TimedOut,
    /// The request failed with an error.
    Failed,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timedOut"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Compact view of a returned context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    /// Context identifier.
    pub context_id: String,
    /// Query identifier.
    pub query_id: String,
    /// Chunk ids in output order.
    pub chunk_ids: Vec<String>,
    /// Scores in output order.
    pub scores: Vec<f32>,
    /// Discovery hops in output order.
    pub hops: Vec<usize>,
    /// Mean score.
    pub avg_relevance: f32,
    /// Relevance gate outcome.
    pub meets_threshold: bool,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Whether any returned chunk was a relaxed admission.
    pub relaxed: bool,
}

impl ContextSummary {
    /// Summarize a context.
    pub fn from_context(context: &RetrievalContext) -> Self {
        Self {
            context_id: context.context_id.clone(),
            query_id: context.query_id.clone(),
            chunk_ids: context
                .chunks
                .iter()
                .map(|c| c.chunk.chunk_id.to_string())
                .collect(),
            scores: context.chunks.iter().map(|c| c.score).collect(),
            hops: context.chunks.iter().map(|c| c.hop_number).collect(),
            avg_relevance: context.avg_relevance,
            meets_threshold: context.meets_threshold,
            stop_reason: context.stop_reason,
            relaxed: context.chunks.iter().any(|c| c.relaxed),
        }
    }
}

/// Timing and cost of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditTiming {
    /// Wall time from validation to completion.
    pub total_ms: u64,
    /// Time in retrieval and fusion.
    pub retrieval_ms: u64,
    /// Time waiting for the judge.
    pub judge_ms: u64,
    /// Judge-reported cost.
    pub judge_cost: f64,
    /// Retrievals executed.
    pub hops_executed: usize,
}

impl AuditTiming {
    /// Build from engine telemetry and total wall time.
    pub fn from_telemetry(telemetry: &RetrievalTelemetry, total_ms: u64) -> Self {
        Self {
            total_ms,
            retrieval_ms: telemetry.retrieval_latency_ms,
            judge_ms: telemetry.judge_latency_ms,
            judge_cost: telemetry.judge_cost,
            hops_executed: telemetry.hops_executed,
        }
    }
}

/// One structured audit record per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Unique record id.
    pub record_id: Uuid,
    /// When the record was assembled.
    pub recorded_at: DateTime<Utc>,
    /// The request as received.
    pub request: RequestEcho,
    /// How the request ended.
    pub outcome: AuditOutcome,
    /// Error text for non-completed outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Present only for completed requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSummary>,
    /// Judge verdicts collected before the request ended.
    pub evaluations: Vec<HopEvaluation>,
    /// Timing and cost.
    pub timing: AuditTiming,
}

impl AuditRecord {
    /// Create a record stamped now.
    pub fn new(request: RequestEcho, outcome: AuditOutcome, timing: AuditTiming) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            request,
            outcome,
            error: None,
            context: None,
            evaluations: Vec::new(),
            timing,
        }
    }

    /// Attach the returned context summary.
    pub fn with_context(mut self, context: &RetrievalContext) -> Self {
        self.context = Some(ContextSummary::from_context(context));
        self
    }

    /// Attach error text.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach evaluations.
    pub fn with_evaluations(mut self, evaluations: Vec<HopEvaluation>) -> Self {
        self.evaluations = evaluations;
        self
    }
}

// ============================================================================
// Sink
// ============================================================================

/// Destination for audit records.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Persist one record.
    async fn write(&self, record: AuditRecord) -> Result<(), SinkError>;
}

/// Appends one JSON line per record.
#[derive(Debug)]
pub struct JsonlAuditSink {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditSink {
    /// Sink writing to `path`; parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AnalyticsSink for JsonlAuditSink {
    async fn write(&self, record: AuditRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Bounded, non-blocking queue in front of an [`AnalyticsSink`].
#[derive(Debug)]
pub struct AnalyticsDispatcher {
    sender: Mutex<Option<mpsc::Sender<AuditRecord>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    dropped: Arc<AtomicU64>,
    capacity: usize,
}

impl AnalyticsDispatcher {
    /// Start the drain task on the current tokio runtime.
    ///
    /// A `capacity` of 0 is raised to 1.
    pub fn spawn(sink: Arc<dyn AnalyticsSink>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, mut receiver) = mpsc::channel::<AuditRecord>(capacity);

        let worker = tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                let record_id = record.record_id;
                if let Err(err) = sink.write(record).await {
                    warn!(%record_id, error = %err, "Analytics sink write failed");
                }
            }
            debug!("Analytics dispatcher drained");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            dropped: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Enqueue a record without waiting. Returns false if it was dropped.
    pub fn submit(&self, record: AuditRecord) -> bool {
        let guard = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(sender) = guard.as_ref() else {
            self.record_drop("dispatcher closed");
            return false;
        };
        match sender.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_drop("queue full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.record_drop("dispatcher closed");
                false
            }
        }
    }

    fn record_drop(&self, reason: &str) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            reason,
            capacity = self.capacity,
            dropped_total = total,
            "Analytics record dropped"
        );
    }

    /// Records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the queue and wait for queued records to reach the sink.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(worker) = worker {
            if let Err(err) = worker.await {
                warn!(error = %err, "Analytics dispatcher task failed");
            }
        }
    }
}
