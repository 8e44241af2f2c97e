//! In-memory chunk vector store with optional JSONL persistence.
//!
//! Records live in an ordered map and queries are a linear scan. This suits
//! rules corpora (a few thousand chunks) where ANN indexing buys nothing.

use super::super::config::VectorIndexConfig;
use super::super::metadata::VectorSearchFilter;
use super::super::traits::{
    CorpusEntry, RecordId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, trace, warn};

/// A stored chunk vector entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVector {
    id: RecordId,
    vector: Vec<f32>,
    payload: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doc_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl From<&VectorInsert> for StoredVector {
    fn from(insert: &VectorInsert) -> Self {
        Self {
            id: insert.id.clone(),
            vector: insert.vector.clone(),
            payload: insert.payload.clone(),
            doc_type: insert.doc_type.clone(),
            source: insert.source.clone(),
        }
    }
}

/// In-memory chunk vector store.
pub struct MemoryVectorStore {
    /// Backing JSONL file, if persistent.
    path: Option<PathBuf>,

    /// Dimension of vectors.
    dimension: usize,

    /// Similarity metric.
    metric: VectorMetric,

    /// Records keyed by id; ordered so scans and ties are deterministic.
    vectors: RwLock<BTreeMap<RecordId, StoredVector>>,
}

impl MemoryVectorStore {
    /// Create an empty memory-only store.
    pub fn new(dimension: usize, metric: VectorMetric) -> Self {
        Self {
            path: None,
            dimension,
            metric,
            vectors: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open a store from its configuration, loading the JSONL file if present.
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        if config.dimension == 0 {
            return Err(DbError::Config {
                message: "vector store dimension must be positive".to_string(),
            });
        }

        let store = Self {
            path: config.path.clone(),
            dimension: config.dimension,
            metric: config.metric,
            vectors: RwLock::new(BTreeMap::new()),
        };

        if let Some(ref path) = config.path {
            debug!("Opening MemoryVectorStore at {:?}", path);
            if path.exists() {
                store.load_from_file(path)?;
            } else if !config.create_if_missing {
                return Err(DbError::StoreNotFound { path: path.clone() });
            }
        }

        Ok(store)
    }

    /// Load records from a JSONL file.
    fn load_from_file(&self, path: &Path) -> DbResult<()> {
        debug!("Loading vectors from {:?}", path);

        let file = File::open(path).map_err(|e| DbError::vector_io(path, e.to_string()))?;
        let reader = BufReader::new(file);

        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let mut skipped = 0usize;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| DbError::vector_io(path, e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            let stored = match serde_json::from_str::<StoredVector>(&line) {
                Ok(stored) => stored,
                Err(e) => {
                    debug!("Skipping invalid line {}: {}", line_num + 1, e);
                    skipped += 1;
                    continue;
                }
            };

            if stored.vector.len() != self.dimension {
                return Err(DbError::vector_parse(
                    path,
                    line_num + 1,
                    format!(
                        "dimension {} does not match store dimension {}",
                        stored.vector.len(),
                        self.dimension
                    ),
                ));
            }

            vectors.insert(stored.id.clone(), stored);
        }

        if skipped > 0 {
            warn!("Skipped {} unreadable lines in {:?}", skipped, path);
        }
        debug!("Loaded {} vectors", vectors.len());
        Ok(())
    }

    /// Save all records to the JSONL file (no-op for memory-only stores).
    fn save_to_file(&self) -> DbResult<()> {
        let Some(ref data_path) = self.path else {
            return Ok(());
        };
        debug!("Saving vectors to {:?}", data_path);

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        if let Some(parent) = data_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file =
            File::create(data_path).map_err(|e| DbError::vector_io(data_path, e.to_string()))?;
        let mut writer = BufWriter::new(file);
        for stored in vectors.values() {
            let line = serde_json::to_string(stored)?;
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;

        debug!("Saved {} vectors", vectors.len());
        Ok(())
    }

    fn passes(stored: &StoredVector, filter: Option<&VectorSearchFilter>) -> bool {
        filter
            .map(|f| f.matches(stored.doc_type.as_deref(), stored.source.as_deref()))
            .unwrap_or(true)
    }

    /// Compute similarity between two vectors.
    fn compute_similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
            VectorMetric::L2 => -euclidean_distance(a, b), // Negate so higher is better
        }
    }
}

impl VectorIndexBackend for MemoryVectorStore {
    fn query(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&VectorSearchFilter>,
    ) -> DbResult<Vec<VectorSearchResult>> {
        trace!("Querying MemoryVectorStore, limit={}", limit);

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut scored: Vec<(f32, &StoredVector)> = vectors
            .values()
            .filter(|v| Self::passes(v, filter))
            .map(|v| (self.compute_similarity(embedding, &v.vector), v))
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.id.cmp(&b.1.id))
        });

        let results: Vec<VectorSearchResult> = scored
            .into_iter()
            .take(limit)
            .map(|(score, stored)| {
                VectorSearchResult::new(stored.id.clone(), score, stored.payload.clone())
            })
            .collect();

        trace!("Found {} results", results.len());
        Ok(results)
    }

    fn scan(&self, filter: Option<&VectorSearchFilter>) -> DbResult<Vec<CorpusEntry>> {
        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        Ok(vectors
            .values()
            .filter(|v| Self::passes(v, filter))
            .map(|v| CorpusEntry {
                id: v.id.clone(),
                payload: v.payload.clone(),
            })
            .collect())
    }

    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()> {
        debug!("Upserting {} vectors", vectors.len());

        let mut stored = self
            .vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        for insert in vectors {
            if insert.id.as_str().trim().is_empty() {
                return Err(DbError::invalid_record("chunk id is empty"));
            }
            if insert.vector.len() != self.dimension {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: insert.vector.len(),
                });
            }

            let entry = StoredVector::from(insert);
            stored.insert(entry.id.clone(), entry);
        }

        // Persist immediately
        drop(stored);
        self.save_to_file()
    }

    fn len(&self) -> DbResult<usize> {
        let stored = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(stored.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }
}

// ============================================================================
// Similarity Functions
// ============================================================================

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Compute dot product between two vectors.
fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute Euclidean (L2) distance between two vectors.
fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// Tests
// ============================================================================
