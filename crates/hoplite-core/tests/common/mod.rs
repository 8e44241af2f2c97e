//! Shared collaborators for hoplite-core integration tests.
//!
//! Everything here is in-memory and scripted: embeddings are chosen per query,
//! the vector store is the real `MemoryVectorStore` behind `DbVectorBackend`,
//! and the judge replays a fixed list of steps.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hoplite_core::{
    AnalyticsDispatcher, AnalyticsSink, AuditRecord, BackendError, CancellationToken, Chunk,
    ChunkMetadata, DbVectorBackend, Embedder, EmbeddedChunk, Judge, JudgeError, JudgeRequest,
    JudgeVerdict, RetrievalEngine, RetrievalEngineBuilder, SearchFilters, SinkError,
    VectorBackend, VectorMatch,
};
use hoplite_db::vector::{MemoryVectorStore, VectorMetric};

// ============================================================================
// Corpus helpers
// ============================================================================

/// A rules chunk from the core book.
pub fn rules_chunk(id: &str, header: &str, text: &str) -> Chunk {
    Chunk::new(id, header, text).with_metadata(ChunkMetadata {
        document_id: "core-rules".into(),
        source: "core".into(),
        doc_type: "rules".into(),
        filename: "core.md".into(),
        ..ChunkMetadata::default()
    })
}

/// Unit vector along `index`.
pub fn axis(dimension: usize, index: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[index] = 1.0;
    v
}

/// Real in-memory store holding `chunks`.
pub fn store(dimension: usize, chunks: Vec<(Chunk, Vec<f32>)>) -> Arc<DbVectorBackend> {
    let backend = DbVectorBackend::new(
        Arc::new(MemoryVectorStore::new(dimension, VectorMetric::Cosine)),
        "memory",
    );
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
        .collect();
    backend.upsert_chunks(&embedded).expect("seed store");
    Arc::new(backend)
}

// ============================================================================
// Embedders
// ============================================================================

/// Returns a fixed vector per query text.
///
/// Unrouted queries embed onto the last axis, which no test chunk uses, so
/// every similarity is 0 and the vector path contributes nothing.
pub struct ScriptedEmbedder {
    dimension: usize,
    routes: HashMap<String, Vec<f32>>,
    fail_from_call: Option<usize>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            routes: HashMap::new(),
            fail_from_call: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn route(mut self, query: &str, vector: Vec<f32>) -> Self {
        self.routes.insert(query.to_string(), vector);
        self
    }

    /// Fail every embedding from the `n`-th call on (0-based).
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from_call = Some(n);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Embedder for ScriptedEmbedder {
    fn name(&self) -> &str {
        "scripted-embedder"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(text.to_string());
            calls.len() - 1
        };
        if self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(BackendError::embedder("scripted-embedder", "model not loaded"));
        }
        Ok(self
            .routes
            .get(text)
            .cloned()
            .unwrap_or_else(|| axis(self.dimension, self.dimension - 1)))
    }
}

/// Term-count embedding over a fixed vocabulary.
///
/// Deterministic for any text, which makes it usable with generated corpora.
pub struct BagOfWordsEmbedder {
    vocabulary: Vec<&'static str>,
}

impl BagOfWordsEmbedder {
    pub fn new(vocabulary: Vec<&'static str>) -> Self {
        Self { vocabulary }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        self.vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn name(&self) -> &str {
        "bag-of-words"
    }

    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        Ok(self.vector(text))
    }
}

// ============================================================================
// Vector backend wrapper
// ============================================================================

/// Wraps a backend to inject query and corpus-scan failures and latency.
pub struct FaultyBackend {
    inner: Arc<dyn VectorBackend>,
    fail_from_call: Option<usize>,
    fail_corpus_from_call: Option<usize>,
    delay: Duration,
    queries: AtomicUsize,
    scans: AtomicUsize,
}

impl FaultyBackend {
    pub fn new(inner: Arc<dyn VectorBackend>) -> Self {
        Self {
            inner,
            fail_from_call: None,
            fail_corpus_from_call: None,
            delay: Duration::ZERO,
            queries: AtomicUsize::new(0),
            scans: AtomicUsize::new(0),
        }
    }

    /// Fail every query from the `n`-th call on (0-based).
    pub fn failing_from(mut self, n: usize) -> Self {
        self.fail_from_call = Some(n);
        self
    }

    /// Fail every corpus scan from the `n`-th call on (0-based).
    pub fn failing_corpus_from(mut self, n: usize) -> Self {
        self.fail_corpus_from_call = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VectorBackend for FaultyBackend {
    fn name(&self) -> &str {
        "faulty"
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filters: Option<&SearchFilters>,
    ) -> Result<Vec<VectorMatch>, BackendError> {
        let call = self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_from_call.is_some_and(|n| call >= n) {
            return Err(BackendError::vector_store("faulty", "connection reset"));
        }
        self.inner.query(embedding, k, filters).await
    }

    async fn corpus(&self, filters: Option<&SearchFilters>) -> Result<Vec<Chunk>, BackendError> {
        let call = self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_corpus_from_call.is_some_and(|n| call >= n) {
            return Err(BackendError::corpus("scan interrupted"));
        }
        self.inner.corpus(filters).await
    }
}

// ============================================================================
// Judge
// ============================================================================

/// One scripted judge reaction.
pub enum JudgeStep {
    Verdict(JudgeVerdict),
    Fail(JudgeError),
    /// Sleep, then answer.
    Slow(Duration, JudgeVerdict),
    /// Cancel the caller's token and never answer.
    CancelAndHang(CancellationToken),
}

/// What the judge saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct JudgeCall {
    pub hop_number: usize,
    pub chunk_ids: Vec<String>,
    pub budget: Duration,
}

/// Replays steps in order; answers "sufficient" once they run out.
pub struct ScriptedJudge {
    steps: Mutex<VecDeque<JudgeStep>>,
    calls: Mutex<Vec<JudgeCall>>,
}

impl ScriptedJudge {
    pub fn new(steps: Vec<JudgeStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn sufficient() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> Vec<JudgeCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Judge for ScriptedJudge {
    fn model_identifier(&self) -> &str {
        "scripted-judge"
    }

    async fn evaluate(&self, request: JudgeRequest<'_>) -> Result<JudgeVerdict, JudgeError> {
        self.calls.lock().unwrap().push(JudgeCall {
            hop_number: request.hop_number,
            chunk_ids: request
                .chunks
                .iter()
                .map(|c| c.chunk_id().to_string())
                .collect(),
            budget: request.budget,
        });
        let step = self.steps.lock().unwrap().pop_front();

        match step {
            None => Ok(JudgeVerdict::sufficient("the rules cover it")),
            Some(JudgeStep::Verdict(verdict)) => Ok(verdict),
            Some(JudgeStep::Fail(err)) => Err(err),
            Some(JudgeStep::Slow(delay, verdict)) => {
                tokio::time::sleep(delay).await;
                Ok(verdict)
            }
            Some(JudgeStep::CancelAndHang(token)) => {
                token.cancel();
                std::future::pending().await
            }
        }
    }
}

// ============================================================================
// Analytics
// ============================================================================

/// Keeps every record in memory.
#[derive(Default)]
pub struct MemorySink {
    records: tokio::sync::Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AnalyticsSink for MemorySink {
    async fn write(&self, record: AuditRecord) -> Result<(), SinkError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

/// Dispatcher in front of a fresh [`MemorySink`].
pub fn memory_analytics() -> (Arc<AnalyticsDispatcher>, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let dispatcher = Arc::new(AnalyticsDispatcher::spawn(sink.clone(), 16));
    (dispatcher, sink)
}

// ============================================================================
// Engine
// ============================================================================

pub fn builder(
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorBackend>,
    judge: Arc<dyn Judge>,
) -> RetrievalEngineBuilder {
    RetrievalEngine::builder(embedder, backend, judge)
}

pub fn engine(
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn VectorBackend>,
    judge: Arc<dyn Judge>,
) -> RetrievalEngine {
    builder(embedder, backend, judge).build().expect("build engine")
}

// ============================================================================
// Fixtures
// ============================================================================

pub const DIM: usize = 5;

pub const MOVE_QUERY: &str = "How far can a model move?";
pub const OVERWATCH_QUERY: &str = "Can I overwatch after dashing?";
pub const DASH_FOLLOW_UP: &str = "dash action restrictions";

/// Movement rules: M1 answers the move question, M2 is related, X1 is not.
pub fn movement_corpus() -> Arc<DbVectorBackend> {
    store(
        DIM,
        vec![
            (
                rules_chunk(
                    "M1",
                    "Movement",
                    "Each model may move as far as its Move characteristic in inches.",
                ),
                axis(DIM, 0),
            ),
            (
                rules_chunk("M2", "Dash", "A model that dashes adds 3 inches to its move."),
                vec![0.6, 0.8, 0.0, 0.0, 0.0],
            ),
            (
                rules_chunk(
                    "X1",
                    "Overwatch",
                    "Overwatch lets a unit shoot during the enemy turn.",
                ),
                axis(DIM, 1),
            ),
        ],
    )
}

pub fn movement_embedder() -> ScriptedEmbedder {
    ScriptedEmbedder::new(DIM).route(MOVE_QUERY, axis(DIM, 0))
}

/// Reaction rules: OW1 answers half of the overwatch question, D1 the rest.
pub fn reaction_corpus() -> Arc<DbVectorBackend> {
    store(
        DIM,
        vec![
            (
                rules_chunk(
                    "OW1",
                    "Overwatch",
                    "Overwatch: a unit on overwatch may shoot at an enemy that moves.",
                ),
                axis(DIM, 0),
            ),
            (
                rules_chunk(
                    "D1",
                    "Dash",
                    "Dash: a model that dashes cannot perform other actions.",
                ),
                axis(DIM, 2),
            ),
            (
                rules_chunk("CV1", "Cover", "Cover grants a bonus to saving throws."),
                axis(DIM, 3),
            ),
        ],
    )
}

pub fn reaction_embedder() -> ScriptedEmbedder {
    ScriptedEmbedder::new(DIM)
        .route(OVERWATCH_QUERY, axis(DIM, 0))
        .route(DASH_FOLLOW_UP, axis(DIM, 2))
}
