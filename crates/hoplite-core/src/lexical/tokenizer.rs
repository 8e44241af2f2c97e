//! Unicode-aware tokenizer with keyword normalization for BM25.
//!
//! Pipeline applied to queries and chunk texts alike:
//! 1. Unicode word segmentation, underscores split, lowercase
//! 2. Greedy longest-match keyword normalization
//! 3. For non-keyword words: alphabetic filter, minimum length, stop words,
//!    optional Snowball stemming
//!
//! Canonical keyword tokens skip step 3 so short or stop-word-like game terms
//! ("ap", "move") always survive.

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use super::keywords::{split_words, KeywordLibrary};

/// Tokenizer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Apply Snowball English stemming to non-keyword tokens.
    pub stemming: bool,
    /// Remove common stop words.
    pub remove_stopwords: bool,
    /// Minimum token length to include.
    pub min_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            stemming: false,
            remove_stopwords: true,
            min_token_length: 2,
        }
    }
}

/// Unicode-aware tokenizer.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<&'static str>,
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("config", &self.config)
            .finish()
    }
}

impl Tokenizer {
    /// Create a new tokenizer with the given configuration.
    pub fn new(config: TokenizerConfig) -> Self {
        let stemmer = if config.stemming {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        Self {
            config,
            stemmer,
            stopwords: Self::default_stopwords(),
        }
    }

    /// Tokenize and normalize text against a keyword library.
    pub fn tokenize(&self, text: &str, library: &KeywordLibrary) -> Vec<String> {
        let words = split_words(text);
        let longest = library.max_phrase_len();
        let mut tokens = Vec::with_capacity(words.len());

        let mut i = 0;
        while i < words.len() {
            let window = longest.min(words.len() - i);
            let matched = (1..=window)
                .rev()
                .find_map(|n| library.lookup(&words[i..i + n]).map(|token| (n, token)));

            match matched {
                Some((n, token)) => {
                    tokens.push(token.to_string());
                    i += n;
                }
                None => {
                    if let Some(token) = self.process_token(&words[i]) {
                        tokens.push(token);
                    }
                    i += 1;
                }
            }
        }

        tokens
    }

    /// Process a single lowercase word through the filter pipeline.
    fn process_token(&self, word: &str) -> Option<String> {
        if !word.chars().any(char::is_alphabetic) {
            return None;
        }

        if word.chars().count() < self.config.min_token_length {
            return None;
        }

        if self.config.remove_stopwords && self.stopwords.contains(word) {
            return None;
        }

        let token = match self.stemmer {
            Some(ref stemmer) => stemmer.stem(word).to_string(),
            None => word.to_string(),
        };

        // Some stems become too short.
        if token.chars().count() < self.config.min_token_length {
            return None;
        }

        Some(token)
    }

    /// English stop words for rules questions.
    ///
    /// Game-relevant verbs and quantities ("move", "first", "each turn") are
    /// deliberately absent.
    fn default_stopwords() -> HashSet<&'static str> {
        [
            // Articles
            "a", "an", "the", // Prepositions
            "in", "on", "at", "to", "of", "with", "by", "from", "as", "into", "through", "during",
            "before", "after", "above", "below", "between", "under", "over", "out", "up", "down",
            "off", // Conjunctions
            "and", "or", "but", "nor", "so", "yet", // Pronouns
            "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them", "my",
            "your", "his", "its", "our", "their", "this", "that", "these", "those", "which", "who",
            "whom", "whose", "what", "where", "when", "how", "why", // Auxiliaries
            "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
            "do", "does", "did", "doing", "will", "would", "could", "should", "may", "might",
            "must", "shall", "can", // Other common words
            "not", "no", "yes", "all", "any", "both", "few", "more", "most", "other", "some",
            "such", "than", "too", "very", "just", "also", "only", "own", "same", "then", "there",
            "here", "now", "always", "never", "ever", "about", "whether",
        ]
        .into_iter()
        .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(TokenizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexical::keywords::KeywordEntry;

    fn plain(text: &str) -> Vec<String> {
        Tokenizer::default().tokenize(text, &KeywordLibrary::empty())
    }

    #[test]
    fn test_basic_tokenization() {
        assert_eq!(plain("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_stopword_removal() {
        let tokens = plain("How far can a model move?");
        assert_eq!(tokens, vec!["far", "model", "move"]);
    }

    #[test]
    fn test_only_stopwords_is_empty() {
        assert!(plain("what is the and of it").is_empty());
    }

    #[test]
    fn test_numbers_and_short_tokens_dropped() {
        assert_eq!(plain("a b 42 de 3rd"), vec!["de", "3rd"]);
    }

    #[test]
    fn test_stemming_optional() {
        let stemming = Tokenizer::new(TokenizerConfig {
            stemming: true,
            ..Default::default()
        });
        let tokens = stemming.tokenize("running runs", &KeywordLibrary::empty());
        assert!(tokens.iter().all(|t| t == "run"));

        assert_eq!(plain("running runs"), vec!["running", "runs"]);
    }

    #[test]
    fn test_unicode_text() {
        let tokens = plain("Café NAÏVE résumé");
        assert_eq!(tokens, vec!["café", "naïve", "résumé"]);
    }

    #[test]
    fn test_keyword_phrases_collapse() {
        let library = KeywordLibrary::from_entries(vec![
            KeywordEntry::new("fire team"),
            KeywordEntry::new("ap").with_alias("action points"),
        ])
        .unwrap();
        let tokenizer = Tokenizer::default();

        assert_eq!(
            tokenizer.tokenize("Each Fire-Team spends action points", &library),
            vec!["each", "fire_team", "spends", "ap"]
        );
        assert_eq!(
            tokenizer.tokenize("fire_teams and fireteam", &library),
            vec!["fire_team", "fire_team"]
        );
    }

    #[test]
    fn test_keyword_tokens_skip_filters() {
        let library = KeywordLibrary::from_entries(vec![KeywordEntry::new("can")]).unwrap();
        let tokens = Tokenizer::default().tokenize("Can I move?", &library);
        assert_eq!(tokens, vec!["can", "move"]);
    }
}
