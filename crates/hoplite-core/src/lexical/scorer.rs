//! BM25 scoring function.
//!
//! ```text
//! score(D, Q) = Σ IDF(q_i) * (f(q_i, D) * (k1 + 1)) / (f(q_i, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```
//!
//! Where:
//! - f(q_i, D) = frequency of query term q_i in document D
//! - |D| = document length in normalized tokens
//! - avgdl = average document length over the candidate set
//! - k1 = term frequency saturation (default: 1.5)
//! - b = length normalization (default: 0.75)

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BM25_B, DEFAULT_BM25_K1};

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation parameter.
    pub k1: f32,
    /// Document length normalization parameter.
    /// 0 = no normalization, 1 = full normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_BM25_K1,
            b: DEFAULT_BM25_B,
        }
    }
}

/// Inverse document frequency of a term.
///
/// ```text
/// IDF(t) = max(0, ln((N - df(t) + 0.5) / (df(t) + 0.5)))
/// ```
///
/// Terms present in more than half of the candidates would go negative; they
/// are clamped so no term can lower a document's score.
#[inline]
pub fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5)).ln().max(0.0)
}

/// BM25 contribution of one query term to one document.
///
/// `avg_doc_len` of zero (an all-empty candidate set) disables length
/// normalization instead of dividing by zero.
#[inline]
pub fn bm25_term_score(
    term_freq: usize,
    doc_len: usize,
    avg_doc_len: f32,
    idf_value: f32,
    params: &Bm25Params,
) -> f32 {
    let tf = term_freq as f32;
    let length_ratio = if avg_doc_len > 0.0 {
        doc_len as f32 / avg_doc_len
    } else {
        1.0
    };

    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf + params.k1 * (1.0 - params.b + params.b * length_ratio);

    idf_value * numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idf_rare_term_is_high() {
        assert!(idf(1000, 10) > 4.0);
        assert!(idf(1000, 1) > idf(1000, 10));
    }

    #[test]
    fn test_idf_common_term_clamps_to_zero() {
        assert_eq!(idf(1000, 900), 0.0);
        assert_eq!(idf(3, 2), 0.0);
        assert_eq!(idf(1, 1), 0.0);
    }

    #[test]
    fn test_idf_matches_formula() {
        let expected = ((10.0_f32 - 2.0 + 0.5) / (2.0 + 0.5)).ln();
        assert!((idf(10, 2) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_length_normalization() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);

        let short = bm25_term_score(3, 50, 100.0, idf_val, &params);
        let long = bm25_term_score(3, 200, 100.0, idf_val, &params);
        assert!(short > long);

        let flat = Bm25Params { k1: 1.5, b: 0.0 };
        assert!(bm25_term_score(3, 200, 100.0, idf_val, &flat) > long);
    }

    #[test]
    fn test_tf_saturation() {
        let params = Bm25Params::default();
        let idf_val = idf(100, 10);

        let s1 = bm25_term_score(1, 100, 100.0, idf_val, &params);
        let s5 = bm25_term_score(5, 100, 100.0, idf_val, &params);
        let s100 = bm25_term_score(100, 100, 100.0, idf_val, &params);

        assert!(s5 > s1);
        assert!(s100 > s5);
        // Bounded by idf * (k1 + 1).
        assert!(s100 < idf_val * (params.k1 + 1.0));
    }

    #[test]
    fn test_zero_average_length() {
        let score = bm25_term_score(1, 0, 0.0, 1.0, &Bm25Params::default());
        assert!(score.is_finite());
        assert!(score > 0.0);
    }
}
