//! Per-candidate-set BM25 inverted index.
//!
//! The index is built over whatever candidate set the caller supplies (full
//! corpus or a filtered shortlist) and discarded after the query. Document
//! statistics are therefore always consistent with the candidates scored.

use std::collections::{HashMap, HashSet};

use super::keywords::KeywordLibrary;
use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::Tokenizer;
use super::LexicalHit;
use crate::types::{Chunk, ChunkId};

/// Statistics for a single document in the index.
#[derive(Debug, Clone)]
pub struct DocumentStats {
    /// Normalized token count.
    pub length: usize,
    /// Chunk id.
    pub doc_id: ChunkId,
}

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone)]
pub struct Posting {
    /// Index into the documents array.
    pub doc_idx: usize,
    /// Term frequency in this document.
    pub term_freq: usize,
}

/// BM25 inverted index.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    /// Term → postings list.
    inverted_index: HashMap<String, Vec<Posting>>,
    documents: Vec<DocumentStats>,
    avg_doc_len: f32,
    total_tokens: usize,
}

impl Bm25Index {
    /// Create an empty index.
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            inverted_index: HashMap::new(),
            documents: Vec::new(),
            avg_doc_len: 0.0,
            total_tokens: 0,
        }
    }

    /// Index every candidate chunk's text.
    pub fn build(
        params: Bm25Params,
        candidates: &[Chunk],
        tokenizer: &Tokenizer,
        library: &KeywordLibrary,
    ) -> Self {
        let mut index = Self::new(params);
        for chunk in candidates {
            let tokens = tokenizer.tokenize(&chunk.text, library);
            index.add_document(chunk.chunk_id.clone(), tokens);
        }
        index
    }

    /// Add a pre-tokenized document. Returns its internal index.
    pub fn add_document(&mut self, doc_id: ChunkId, tokens: Vec<String>) -> usize {
        let doc_len = tokens.len();

        let mut term_freqs: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0) += 1;
        }

        let doc_idx = self.documents.len();
        self.documents.push(DocumentStats {
            length: doc_len,
            doc_id,
        });

        for (term, tf) in term_freqs {
            self.inverted_index.entry(term).or_default().push(Posting {
                doc_idx,
                term_freq: tf,
            });
        }

        self.total_tokens += doc_len;
        self.avg_doc_len = self.total_tokens as f32 / self.documents.len() as f32;

        doc_idx
    }

    /// Score documents against normalized query tokens.
    ///
    /// Every document containing at least one query term is ranked, including
    /// those whose terms all have zero IDF. Results are sorted by score
    /// descending, then chunk id ascending, and carry 1-indexed ranks.
    pub fn search(&self, query_tokens: &[String], top_k: usize) -> Vec<LexicalHit> {
        if self.documents.is_empty() || query_tokens.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let num_docs = self.documents.len();
        let mut seen = HashSet::new();
        let mut scores: HashMap<usize, f32> = HashMap::new();

        for term in query_tokens {
            if !seen.insert(term.as_str()) {
                continue;
            }
            let Some(postings) = self.inverted_index.get(term) else {
                continue;
            };
            let idf_val = idf(num_docs, postings.len());
            for posting in postings {
                let doc_stats = &self.documents[posting.doc_idx];
                let term_score = bm25_term_score(
                    posting.term_freq,
                    doc_stats.length,
                    self.avg_doc_len,
                    idf_val,
                    &self.params,
                );
                *scores.entry(posting.doc_idx).or_insert(0.0) += term_score;
            }
        }

        let mut scored_docs: Vec<(usize, f32)> = scores.into_iter().collect();
        scored_docs.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.documents[a.0].doc_id.cmp(&self.documents[b.0].doc_id))
        });

        scored_docs
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(rank, (doc_idx, score))| LexicalHit {
                chunk_id: self.documents[doc_idx].doc_id.clone(),
                score,
                rank: rank + 1,
            })
            .collect()
    }

    /// Number of indexed documents.
    pub fn num_documents(&self) -> usize {
        self.documents.len()
    }

    /// Number of distinct terms.
    pub fn vocabulary_size(&self) -> usize {
        self.inverted_index.len()
    }

    /// Average normalized document length.
    pub fn avg_doc_length(&self) -> f32 {
        self.avg_doc_len
    }

    /// Number of documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.inverted_index.get(term).map(Vec::len).unwrap_or(0)
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        Tokenizer::default().tokenize(text, &KeywordLibrary::empty())
    }

    fn index(docs: &[(&str, &str)]) -> Bm25Index {
        let mut index = Bm25Index::new(Bm25Params::default());
        for (id, text) in docs {
            index.add_document(ChunkId::new(*id), tokens(text));
        }
        index
    }

    #[test]
    fn test_statistics() {
        let index = index(&[("a", "overwatch fire"), ("b", "overwatch dash charge fight")]);
        assert_eq!(index.num_documents(), 2);
        assert_eq!(index.document_frequency("overwatch"), 2);
        assert_eq!(index.document_frequency("dash"), 1);
        assert!((index.avg_doc_length() - 3.0).abs() < 1e-6);
        assert_eq!(index.vocabulary_size(), 5);
    }

    #[test]
    fn test_rare_term_ranks_first() {
        let index = index(&[
            ("a", "charge fight consolidate"),
            ("b", "dash restrictions apply after a dash"),
            ("c", "shooting cover visibility"),
            ("d", "charge reaction"),
            ("e", "morale tests"),
        ]);
        let hits = index.search(&tokens("dash restrictions"), 10);
        assert_eq!(hits[0].chunk_id.as_str(), "b");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_ties_break_by_chunk_id() {
        let index = index(&[
            ("zz", "overwatch"),
            ("aa", "overwatch"),
            ("mm", "overwatch"),
            ("x1", "morale"),
            ("x2", "cover"),
            ("x3", "charge"),
            ("x4", "fight"),
        ]);
        let hits = index.search(&tokens("overwatch"), 10);
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["aa", "mm", "zz"]);
        assert_eq!(hits.iter().map(|h| h.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_common_terms_score_zero_but_rank() {
        let index = index(&[("a", "move"), ("b", "move"), ("c", "dash")]);
        let hits = index.search(&tokens("move"), 10);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_top_k_and_empty_inputs() {
        let index = index(&[("a", "dash"), ("b", "dash"), ("c", "x"), ("d", "y"), ("e", "z")]);
        assert_eq!(index.search(&tokens("dash"), 1).len(), 1);
        assert!(index.search(&[], 10).is_empty());
        assert!(index.search(&tokens("dash"), 0).is_empty());
        assert!(Bm25Index::new(Bm25Params::default())
            .search(&tokens("dash"), 10)
            .is_empty());
    }

    #[test]
    fn test_duplicate_query_terms_count_once() {
        let index = index(&[("a", "dash"), ("b", "fight"), ("c", "cover")]);
        let once = index.search(&tokens("dash"), 10);
        let twice = index.search(&tokens("dash dash"), 10);
        assert_eq!(once[0].score, twice[0].score);
    }
}
