//! Retrieval engine – the multi-hop orchestrator.
//!
//! [`RetrievalEngine::retrieve`] drives one request through an explicit state
//! machine:
//!
//! ```text
//! Retrieve(hop, query) ──► Evaluate(hop) ──► Retrieve(hop + 1, missing_query)
//!          │                     │
//!          └──────► Done ◄───────┘
//! ```
//!
//! Each retrieval runs the lexical and vector paths concurrently, fuses them
//! and merges the admitted chunks into the accumulation (first discovery wins).
//! The judge is consulted only while follow-up hops remain. Every suspension
//! point races against the request's cancellation token and deadline.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use crate::analytics::{AnalyticsDispatcher, AuditOutcome, AuditRecord, AuditTiming};
use crate::backend::{Embedder, VectorBackend};
use crate::config::{CandidateConfig, EngineConfig, RetrievalConfig};
use crate::constants::{DEFAULT_JUDGE_TIMEOUT_MS, JUDGE_FAILED_PREFIX};
use crate::errors::{BackendError, JudgeError, RetrievalError};
use crate::fusion::{fuse_and_select, FusionConfig};
use crate::judge::{Judge, JudgeRequest, JudgeVerdict};
use crate::lexical::{Bm25Config, KeywordLibrary, KeywordLibraryHandle, LexicalHit, LexicalScorer};
use crate::request::RetrieveRequest;
use crate::types::{
    Chunk, ChunkId, HopEvaluation, RetrievalContext, RetrievalTelemetry, ScoredChunk,
    SearchFilters, StopReason,
};
use crate::vector::{VectorHit, VectorSearcher};

// ============================================================================
// State machine
// ============================================================================

/// Where the hop loop is.
#[derive(Debug)]
enum HopState {
    Retrieve { hop: usize, query: String },
    Evaluate { hop: usize },
    Done(StopReason),
}

/// Result of one retrieval, before merging.
#[derive(Debug)]
enum HopOutcome {
    /// Admitted chunks in selection order, tagged with the hop.
    Fused(Vec<ScoredChunk>),
    /// Both paths succeeded but nothing was admitted.
    Empty,
    /// A path failed.
    Failed(BackendError),
}

/// What a request produced before it finished, kept for the audit record.
#[derive(Debug, Default)]
struct RunTrail {
    evaluations: Vec<HopEvaluation>,
    telemetry: RetrievalTelemetry,
}

/// Lexical hits plus the chunk bodies they refer to.
type LexicalPath = (Vec<LexicalHit>, HashMap<ChunkId, Chunk>);

// ============================================================================
// RetrievalEngine
// ============================================================================

/// Hybrid retrieval engine.
///
/// The engine holds no per-request mutable state and can serve concurrent
/// requests; collaborators are shared by `Arc`. Limiting the number of
/// concurrent requests is up to the caller.
///
/// # Example
///
/// ```ignore
/// use hoplite_core::{EngineConfig, RetrievalEngine, RetrieveRequest};
///
/// let config = EngineConfig::load_default()?;
/// let engine = RetrievalEngine::builder(embedder, backend, judge)
///     .with_config(&config)
///     .build()?;
/// let context = engine.retrieve(RetrieveRequest::new("Can I overwatch after dashing?")).await?;
/// ```
pub struct RetrievalEngine {
    searcher: VectorSearcher,
    judge: Arc<dyn Judge>,
    lexical: Arc<LexicalScorer>,
    keywords: KeywordLibraryHandle,
    fusion: FusionConfig,
    candidates: CandidateConfig,
    stop_on_repeated_query: bool,
    judge_timeout: Duration,
    analytics: Option<Arc<AnalyticsDispatcher>>,
}

impl std::fmt::Debug for RetrievalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalEngine")
            .field("searcher", &self.searcher)
            .field("judge", &self.judge.model_identifier())
            .field("fusion", &self.fusion)
            .field("candidates", &self.candidates)
            .field("judge_timeout", &self.judge_timeout)
            .field("analytics", &self.analytics.is_some())
            .finish()
    }
}

impl RetrievalEngine {
    /// Start building an engine around its three collaborators.
    pub fn builder(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn VectorBackend>,
        judge: Arc<dyn Judge>,
    ) -> RetrievalEngineBuilder {
        RetrievalEngineBuilder {
            embedder,
            backend,
            judge,
            retrieval: RetrievalConfig::default(),
            judge_timeout: Duration::from_millis(DEFAULT_JUDGE_TIMEOUT_MS),
            keywords: None,
            analytics: None,
        }
    }

    /// The keyword library handle. Replacing its snapshot affects requests
    /// that start afterwards.
    pub fn keywords(&self) -> &KeywordLibraryHandle {
        &self.keywords
    }

    /// Analytics dispatcher, if one is attached.
    pub fn analytics(&self) -> Option<&Arc<AnalyticsDispatcher>> {
        self.analytics.as_ref()
    }

    /// Drain queued audit records.
    pub async fn shutdown(&self) {
        if let Some(analytics) = &self.analytics {
            analytics.shutdown().await;
        }
    }

    /// Run one retrieval request.
    ///
    /// # Errors
    ///
    /// - [`RetrievalError::InvalidRequest`] if the request fails validation.
    /// - [`RetrievalError::Backend`] if hop 0 cannot retrieve.
    /// - [`RetrievalError::Cancelled`] / [`RetrievalError::Timeout`] when the
    ///   token fires or the deadline passes; no partial context is returned.
    ///
    /// Judge failures and failures on later hops are contained and recorded
    /// in the returned context.
    pub async fn retrieve(&self, request: RetrieveRequest) -> Result<RetrievalContext, RetrievalError> {
        let started = Instant::now();
        let mut trail = RunTrail::default();

        let result = self.run(&request, &mut trail).await;
        let total_ms = elapsed_ms(started);

        match &result {
            Ok(context) => tracing::info!(
                context_key = %request.context_key,
                chunks = context.chunks.len(),
                hops = context.telemetry.hops_executed,
                stop_reason = ?context.stop_reason,
                meets_threshold = context.meets_threshold,
                elapsed_ms = total_ms,
                "Retrieval complete"
            ),
            Err(err) => tracing::info!(
                context_key = %request.context_key,
                error = err.kind(),
                elapsed_ms = total_ms,
                "Retrieval aborted: {}",
                err
            ),
        }

        self.emit_audit(&request, &result, trail, total_ms);
        result
    }

    async fn run(
        &self,
        request: &RetrieveRequest,
        trail: &mut RunTrail,
    ) -> Result<RetrievalContext, RetrievalError> {
        request.validate()?;

        let library = self.keywords.snapshot();
        let max_hops = request.effective_max_hops();

        let mut accumulated: Vec<ScoredChunk> = Vec::new();
        let mut seen: HashSet<ChunkId> = HashSet::new();
        let mut tried_queries = vec![query_key(&request.query)];

        let mut state = HopState::Retrieve {
            hop: 0,
            query: request.query.clone(),
        };

        let stop_reason = loop {
            state = match state {
                HopState::Retrieve { hop, query } => {
                    let hop_started = Instant::now();
                    let outcome = self.retrieve_hop(request, &query, hop, &library).await;
                    trail.telemetry.retrieval_latency_ms += elapsed_ms(hop_started);
                    trail.telemetry.hops_executed += 1;

                    match outcome? {
                        HopOutcome::Failed(err) if hop == 0 => return Err(err.into()),
                        HopOutcome::Failed(err) => {
                            tracing::warn!(
                                context_key = %request.context_key,
                                hop,
                                error = %err,
                                "Follow-up retrieval failed, returning accumulated chunks"
                            );
                            HopState::Done(StopReason::BackendFailed)
                        }
                        HopOutcome::Empty if hop > 0 => {
                            tracing::debug!(hop, query = %query, "Follow-up hop found nothing");
                            HopState::Done(StopReason::EmptyHop)
                        }
                        outcome => {
                            let added = match outcome {
                                HopOutcome::Fused(chunks) => merge(&mut accumulated, &mut seen, chunks),
                                _ => 0,
                            };
                            tracing::debug!(
                                context_key = %request.context_key,
                                hop,
                                added,
                                chunks = accumulated.len(),
                                "Hop merged"
                            );
                            if !request.use_multi_hop {
                                HopState::Done(StopReason::MultiHopDisabled)
                            } else if hop >= max_hops {
                                HopState::Done(StopReason::HopBudgetExhausted)
                            } else {
                                HopState::Evaluate { hop }
                            }
                        }
                    }
                }

                HopState::Evaluate { hop } => {
                    let judge_started = Instant::now();
                    let verdict = self.evaluate(request, &accumulated, hop, max_hops).await;
                    trail.telemetry.judge_latency_ms += elapsed_ms(judge_started);

                    match verdict? {
                        Err(err) => {
                            tracing::warn!(
                                context_key = %request.context_key,
                                hop,
                                error = %err,
                                "Judge failed, treating context as sufficient"
                            );
                            trail.evaluations.push(HopEvaluation {
                                hop_number: hop + 1,
                                can_answer: true,
                                reasoning: format!("{JUDGE_FAILED_PREFIX} {err}"),
                                missing_query: None,
                                model_identifier: self.judge.model_identifier().to_string(),
                            });
                            HopState::Done(StopReason::JudgeFailed)
                        }
                        Ok(verdict) => {
                            trail.telemetry.judge_cost += verdict.cost;
                            let evaluation = self.to_evaluation(verdict, hop);
                            let next = self.next_state(&evaluation, hop, &mut tried_queries, request);
                            trail.evaluations.push(evaluation);
                            next
                        }
                    }
                }

                HopState::Done(reason) => break reason,
            };
        };

        Ok(assemble(
            request,
            accumulated,
            std::mem::take(&mut trail.evaluations),
            stop_reason,
            trail.telemetry.clone(),
        ))
    }

    // ------------------------------------------------------------------------
    // Retrieval
    // ------------------------------------------------------------------------

    async fn retrieve_hop(
        &self,
        request: &RetrieveRequest,
        query: &str,
        hop: usize,
        library: &Arc<KeywordLibrary>,
    ) -> Result<HopOutcome, RetrievalError> {
        let filters = request.filters.as_ref();

        let (lexical, vector) = guarded(request, async {
            tokio::join!(
                self.lexical_path(query, filters, Arc::clone(library)),
                self.searcher
                    .search(query, self.candidates.vector_top_k, filters)
            )
        })
        .await?;

        let (lexical, mut bodies) = match lexical {
            Ok(path) => path,
            Err(err) => return Ok(HopOutcome::Failed(err)),
        };
        let vector: Vec<VectorHit> = match vector {
            Ok(hits) => hits,
            Err(err) => return Ok(HopOutcome::Failed(err)),
        };

        let selection = fuse_and_select(
            &lexical,
            &vector,
            &self.fusion,
            request.max_chunks,
            request.min_relevance,
        );
        tracing::debug!(
            hop,
            lexical = lexical.len(),
            vector = vector.len(),
            fused = selection.fused_total,
            admitted = selection.candidates.len(),
            relaxed = selection.relaxed,
            "Hop fused"
        );
        if selection.is_empty() {
            return Ok(HopOutcome::Empty);
        }

        for hit in vector {
            bodies.entry(hit.chunk.chunk_id.clone()).or_insert(hit.chunk);
        }

        let chunks = selection
            .candidates
            .into_iter()
            .map(|candidate| {
                let chunk = bodies.remove(&candidate.chunk_id).ok_or_else(|| {
                    RetrievalError::Internal(format!(
                        "fused chunk `{}` has no body",
                        candidate.chunk_id
                    ))
                })?;
                Ok(ScoredChunk {
                    chunk,
                    score: candidate.score,
                    hop_number: hop,
                    relaxed: candidate.relaxed,
                })
            })
            .collect::<Result<Vec<_>, RetrievalError>>()?;

        Ok(HopOutcome::Fused(chunks))
    }

    async fn lexical_path(
        &self,
        query: &str,
        filters: Option<&SearchFilters>,
        library: Arc<KeywordLibrary>,
    ) -> Result<LexicalPath, BackendError> {
        let limit = self.candidates.lexical_top_k;
        if limit == 0 {
            return Ok((Vec::new(), HashMap::new()));
        }

        let corpus = self.searcher.backend().corpus(filters).await?;
        let scorer = Arc::clone(&self.lexical);
        let query = query.to_string();

        tokio::task::spawn_blocking(move || {
            let hits = scorer.score(&query, &corpus, &library, limit);
            let wanted: HashSet<&ChunkId> = hits.iter().map(|h| &h.chunk_id).collect();
            let bodies: HashMap<ChunkId, Chunk> = corpus
                .iter()
                .filter(|c| wanted.contains(&c.chunk_id))
                .map(|c| (c.chunk_id.clone(), c.clone()))
                .collect();
            (hits, bodies)
        })
        .await
        .map_err(|e| BackendError::Lexical {
            reason: format!("scoring task failed: {e}"),
        })
    }

    // ------------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------------

    /// Ask the judge, containing its failures in the inner result.
    async fn evaluate(
        &self,
        request: &RetrieveRequest,
        accumulated: &[ScoredChunk],
        hop: usize,
        max_hops: usize,
    ) -> Result<Result<JudgeVerdict, JudgeError>, RetrievalError> {
        let budget = self.judge_budget(request, hop, max_hops);
        let judge_request = JudgeRequest {
            original_query: &request.query,
            chunks: accumulated,
            hop_number: hop,
            deadline: Instant::now() + budget,
            budget,
        };

        let outcome = guarded(
            request,
            tokio::time::timeout(budget, self.judge.evaluate(judge_request)),
        )
        .await?;

        Ok(match outcome {
            Ok(verdict) => verdict,
            Err(_) => Err(JudgeError::Timeout(
                u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            )),
        })
    }

    /// The remaining request budget split over the evaluations still possible,
    /// capped by the configured judge timeout.
    fn judge_budget(&self, request: &RetrieveRequest, hop: usize, max_hops: usize) -> Duration {
        let Some(deadline) = request.deadline else {
            return self.judge_timeout;
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        let share = u32::try_from(max_hops.saturating_sub(hop) + 1).unwrap_or(u32::MAX);
        (remaining / share).min(self.judge_timeout)
    }

    fn to_evaluation(&self, verdict: JudgeVerdict, hop: usize) -> HopEvaluation {
        let missing_query = if verdict.can_answer {
            None
        } else {
            verdict
                .missing_query
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
        };
        HopEvaluation {
            hop_number: hop + 1,
            can_answer: verdict.can_answer,
            reasoning: verdict.reasoning,
            missing_query,
            model_identifier: self.judge.model_identifier().to_string(),
        }
    }

    fn next_state(
        &self,
        evaluation: &HopEvaluation,
        hop: usize,
        tried_queries: &mut Vec<String>,
        request: &RetrieveRequest,
    ) -> HopState {
        if evaluation.can_answer {
            return HopState::Done(StopReason::Sufficient);
        }
        let Some(query) = evaluation.missing_query.clone() else {
            return HopState::Done(StopReason::NoFollowUp);
        };

        let key = query_key(&query);
        if tried_queries.contains(&key) {
            tracing::warn!(
                context_key = %request.context_key,
                hop,
                query = %query,
                "Judge proposed a query that was already retrieved"
            );
            if self.stop_on_repeated_query {
                return HopState::Done(StopReason::RepeatedQuery);
            }
        } else {
            tried_queries.push(key);
        }

        HopState::Retrieve {
            hop: hop + 1,
            query,
        }
    }

    // ------------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------------

    fn emit_audit(
        &self,
        request: &RetrieveRequest,
        result: &Result<RetrievalContext, RetrievalError>,
        trail: RunTrail,
        total_ms: u64,
    ) {
        let Some(analytics) = &self.analytics else {
            return;
        };

        let record = match result {
            Ok(context) => AuditRecord::new(
                request.echo(),
                AuditOutcome::Completed,
                AuditTiming::from_telemetry(&context.telemetry, total_ms),
            )
            .with_context(context)
            .with_evaluations(context.hop_evaluations.clone()),
            Err(err) => {
                let outcome = match err {
                    RetrievalError::Cancelled => AuditOutcome::Cancelled,
                    RetrievalError::Timeout => AuditOutcome::TimedOut,
                    _ => AuditOutcome::Failed,
                };
                AuditRecord::new(
                    request.echo(),
                    outcome,
                    AuditTiming::from_telemetry(&trail.telemetry, total_ms),
                )
                .with_error(err.to_string())
                .with_evaluations(trail.evaluations)
            }
        };

        analytics.submit(record);
    }
}

// ============================================================================
// RetrievalEngineBuilder
// ============================================================================

/// Builder for [`RetrievalEngine`].
pub struct RetrievalEngineBuilder {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorBackend>,
    judge: Arc<dyn Judge>,
    retrieval: RetrievalConfig,
    judge_timeout: Duration,
    keywords: Option<KeywordLibraryHandle>,
    analytics: Option<Arc<AnalyticsDispatcher>>,
}

impl RetrievalEngineBuilder {
    /// Apply retrieval tuning and the judge timeout from `config`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.retrieval = config.retrieval.clone();
        self.judge_timeout = Duration::from_millis(config.judge.timeout_ms);
        self
    }

    /// Replace the retrieval section only.
    pub fn with_retrieval(mut self, retrieval: RetrievalConfig) -> Self {
        self.retrieval = retrieval;
        self
    }

    /// Set the lexical scorer configuration.
    pub fn with_bm25(mut self, bm25: Bm25Config) -> Self {
        self.retrieval.bm25 = bm25;
        self
    }

    /// Set the fusion configuration.
    pub fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.retrieval.fusion = fusion;
        self
    }

    /// Ceiling for a single judge call.
    pub fn with_judge_timeout(mut self, timeout: Duration) -> Self {
        self.judge_timeout = timeout;
        self
    }

    /// Share a keyword library handle.
    pub fn with_keywords(mut self, keywords: KeywordLibraryHandle) -> Self {
        self.keywords = Some(keywords);
        self
    }

    /// Attach an analytics dispatcher.
    pub fn with_analytics(mut self, analytics: Arc<AnalyticsDispatcher>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DimensionMismatch`] when the embedder and the
    /// vector backend disagree on dimensionality.
    pub fn build(self) -> Result<RetrievalEngine, BackendError> {
        let searcher = VectorSearcher::new(self.embedder, self.backend)?;
        Ok(RetrievalEngine {
            searcher,
            judge: self.judge,
            lexical: Arc::new(LexicalScorer::new(&self.retrieval.bm25)),
            keywords: self.keywords.unwrap_or_default(),
            fusion: self.retrieval.fusion,
            candidates: self.retrieval.candidates,
            stop_on_repeated_query: self.retrieval.stop_on_repeated_query,
            judge_timeout: self.judge_timeout,
            analytics: self.analytics,
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Await `fut` unless the request is cancelled or its deadline passes first.
async fn guarded<F: Future>(request: &RetrieveRequest, fut: F) -> Result<F::Output, RetrievalError> {
    let deadline = async {
        match request.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        _ = request.cancellation.cancelled() => Err(RetrievalError::Cancelled),
        _ = deadline => Err(RetrievalError::Timeout),
        output = fut => Ok(output),
    }
}

/// Append chunks not seen before. Returns how many were added.
fn merge(
    accumulated: &mut Vec<ScoredChunk>,
    seen: &mut HashSet<ChunkId>,
    fused: Vec<ScoredChunk>,
) -> usize {
    let before = accumulated.len();
    for chunk in fused {
        if seen.insert(chunk.chunk_id().clone()) {
            accumulated.push(chunk);
        }
    }
    accumulated.len() - before
}

/// Build the final context from the accumulation.
///
/// The best `max_chunks` by score are kept (earlier hop, then earlier
/// accumulation, on ties) and re-ordered by hop ascending, score descending.
fn assemble(
    request: &RetrieveRequest,
    accumulated: Vec<ScoredChunk>,
    hop_evaluations: Vec<HopEvaluation>,
    stop_reason: StopReason,
    telemetry: RetrievalTelemetry,
) -> RetrievalContext {
    let chunk_to_hop = accumulated
        .iter()
        .map(|c| (c.chunk_id().clone(), c.hop_number))
        .collect();

    let mut ranked: Vec<(usize, ScoredChunk)> = accumulated.into_iter().enumerate().collect();
    ranked.sort_by(|(ia, a), (ib, b)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.hop_number.cmp(&b.hop_number))
            .then_with(|| ia.cmp(ib))
    });
    ranked.truncate(request.max_chunks);
    ranked.sort_by(|(ia, a), (ib, b)| {
        a.hop_number
            .cmp(&b.hop_number)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| ia.cmp(ib))
    });
    let chunks: Vec<ScoredChunk> = ranked.into_iter().map(|(_, c)| c).collect();

    let avg_relevance = if chunks.is_empty() {
        0.0
    } else {
        chunks.iter().map(|c| c.score).sum::<f32>() / chunks.len() as f32
    };
    let meets_threshold = avg_relevance >= request.min_relevance
        || chunks.iter().any(|c| c.score >= request.min_relevance);

    RetrievalContext {
        context_id: Uuid::new_v4().to_string(),
        query_id: Uuid::new_v4().to_string(),
        chunks,
        avg_relevance,
        meets_threshold,
        hop_evaluations,
        chunk_to_hop,
        stop_reason,
        telemetry,
    }
}

/// Comparison key for repeated-query detection.
fn query_key(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, score: f32, hop: usize) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(id, "h", "t"),
            score,
            hop_number: hop,
            relaxed: false,
        }
    }

    #[test]
    fn test_merge_keeps_first_discovery() {
        let mut accumulated = Vec::new();
        let mut seen = HashSet::new();
        assert_eq!(
            merge(&mut accumulated, &mut seen, vec![scored("a", 1.0, 0), scored("b", 0.6, 0)]),
            2
        );
        assert_eq!(
            merge(&mut accumulated, &mut seen, vec![scored("b", 1.0, 1), scored("c", 0.9, 1)]),
            1
        );
        let hops: Vec<(&str, usize)> = accumulated
            .iter()
            .map(|c| (c.chunk_id().as_str(), c.hop_number))
            .collect();
        assert_eq!(hops, vec![("a", 0), ("b", 0), ("c", 1)]);
        assert_eq!(accumulated[1].score, 0.6);
    }

    #[test]
    fn test_assemble_orders_by_hop_then_score() {
        let request = RetrieveRequest::new("q").with_max_chunks(3).with_min_relevance(0.5);
        let accumulated = vec![
            scored("a", 1.0, 0),
            scored("b", 0.4, 0),
            scored("c", 1.0, 1),
            scored("d", 0.7, 1),
        ];
        let context = assemble(
            &request,
            accumulated,
            Vec::new(),
            StopReason::Sufficient,
            RetrievalTelemetry::default(),
        );

        assert_eq!(context.chunk_ids(), vec!["a", "c", "d"]);
        assert_eq!(context.chunk_to_hop.len(), 4);
        assert_eq!(context.chunk_to_hop[&ChunkId::new("b")], 0);
        assert!((context.avg_relevance - 0.9).abs() < 1e-6);
        assert!(context.meets_threshold);
    }

    #[test]
    fn test_meets_threshold_is_disjunctive() {
        // Mean 0.35 is below the gate but one chunk clears it.
        let request = RetrieveRequest::new("q").with_min_relevance(0.5);
        let context = assemble(
            &request,
            vec![scored("a", 0.6, 0), scored("b", 0.1, 0)],
            Vec::new(),
            StopReason::Sufficient,
            RetrievalTelemetry::default(),
        );
        assert!(context.meets_threshold);

        let context = assemble(
            &request,
            vec![scored("a", 0.3, 0)],
            Vec::new(),
            StopReason::Sufficient,
            RetrievalTelemetry::default(),
        );
        assert!(!context.meets_threshold);
    }

    #[test]
    fn test_empty_context() {
        let request = RetrieveRequest::new("q");
        let context = assemble(
            &request,
            Vec::new(),
            Vec::new(),
            StopReason::MultiHopDisabled,
            RetrievalTelemetry::default(),
        );
        assert!(context.is_empty());
        assert_eq!(context.avg_relevance, 0.0);
        assert!(!context.meets_threshold);
    }

    #[test]
    fn test_query_key_ignores_case_and_spacing() {
        assert_eq!(query_key("  Dash   Action "), query_key("dash action"));
        assert_ne!(query_key("dash"), query_key("dashes"));
    }

    #[tokio::test]
    async fn test_guarded_prefers_cancellation() {
        let request = RetrieveRequest::new("q").with_timeout(Duration::from_secs(60));
        request.cancellation.cancel();
        let result = guarded(&request, async { 1 }).await;
        assert!(matches!(result, Err(RetrievalError::Cancelled)));
    }

    #[tokio::test]
    async fn test_guarded_reports_deadline() {
        let request = RetrieveRequest::new("q").with_timeout(Duration::from_millis(20));
        let result = guarded(&request, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(RetrievalError::Timeout)));

        let request = RetrieveRequest::new("q");
        assert_eq!(guarded(&request, async { 7 }).await.unwrap(), 7);
    }
}
