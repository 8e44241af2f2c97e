//! Keyword library: surface forms to canonical game terms.
//!
//! The library is produced by ingestion and persisted as JSON:
//!
//! ```json
//! { "version": 1, "keywords": [ { "canonical": "fire team", "aliases": ["fireteam"] } ] }
//! ```
//!
//! At retrieval time it is an immutable snapshot. [`KeywordLibraryHandle`]
//! swaps the snapshot pointer on refresh, so a request that took a snapshot
//! keeps seeing the same library until it finishes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use unicode_segmentation::UnicodeSegmentation;

use crate::errors::KeywordLibraryError;

/// Only supported library file version.
pub const KEYWORD_LIBRARY_VERSION: u32 = 1;

/// One canonical keyword and its explicit aliases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    /// Canonical form (may be multi-word, e.g. "fire team").
    pub canonical: String,
    /// Additional surface forms mapping to the canonical form.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl KeywordEntry {
    /// Create an entry without aliases.
    pub fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            aliases: Vec::new(),
        }
    }

    /// Add an alias.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// On-disk library document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordLibraryFile {
    /// Format version.
    pub version: u32,
    /// Keyword entries.
    #[serde(default)]
    pub keywords: Vec<KeywordEntry>,
}

/// Split text into lowercase words.
///
/// Unicode word segmentation keeps `fire_team` together, so underscores are
/// split explicitly. Hyphens and whitespace are already boundaries, which makes
/// `fire-team`, `fire_team` and `fire team` the same word sequence.
pub fn split_words(text: &str) -> Vec<String> {
    text.unicode_words()
        .flat_map(|word| word.split('_'))
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_sibilant_ending(word: &str) -> bool {
    ["s", "x", "z", "ch", "sh"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
}

fn ends_with_consonant_y(word: &str) -> bool {
    let mut chars = word.chars().rev();
    matches!(
        (chars.next(), chars.next()),
        (Some('y'), Some(c)) if c.is_alphabetic() && !"aeiou".contains(c)
    )
}

/// Regular singular/plural variants of a word (`s`, `es`, `ies`).
fn number_variants(word: &str) -> Vec<String> {
    let mut variants = Vec::new();

    // Singular forms.
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            variants.push(format!("{stem}y"));
        }
    } else if let Some(stem) = word.strip_suffix("es") {
        if is_sibilant_ending(stem) {
            variants.push(stem.to_string());
        } else if !stem.is_empty() {
            variants.push(format!("{stem}e"));
        }
    } else if let Some(stem) = word.strip_suffix('s') {
        if !stem.is_empty() && !stem.ends_with('s') {
            variants.push(stem.to_string());
        }
    }

    // Plural forms, unless the word already read as a plural.
    if variants.is_empty() {
        if ends_with_consonant_y(word) {
            variants.push(format!("{}ies", &word[..word.len() - 1]));
        } else if is_sibilant_ending(word) {
            variants.push(format!("{word}es"));
        } else {
            variants.push(format!("{word}s"));
        }
    }

    variants.retain(|v| v.chars().count() >= 2 && v != word);
    variants
}

/// Immutable keyword lookup table.
#[derive(Debug, Clone, Default)]
pub struct KeywordLibrary {
    generation: u64,
    entries: usize,
    /// Space-joined lowercase word sequence to canonical token.
    phrases: HashMap<String, String>,
    max_phrase_len: usize,
}

impl KeywordLibrary {
    /// A library that normalizes nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a library from entries.
    ///
    /// Exact canonical forms and aliases win over generated plural/singular
    /// variants; among exact forms the first entry wins.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordLibraryError::Invalid`] if a canonical form has no words.
    pub fn from_entries(
        entries: impl IntoIterator<Item = KeywordEntry>,
    ) -> Result<Self, KeywordLibraryError> {
        let mut library = Self::default();
        let mut generated: Vec<(Vec<String>, String)> = Vec::new();

        for entry in entries {
            let canonical_words = split_words(&entry.canonical);
            if canonical_words.is_empty() {
                return Err(KeywordLibraryError::Invalid(format!(
                    "canonical form {:?} contains no words",
                    entry.canonical
                )));
            }
            let token = canonical_words.join("_");
            library.entries += 1;

            let mut forms = vec![canonical_words];
            forms.extend(
                entry
                    .aliases
                    .iter()
                    .map(|alias| split_words(alias))
                    .filter(|words| !words.is_empty()),
            );

            for words in forms {
                if words.len() > 1 {
                    // "fire team" also matches the closed compound "fireteam".
                    generated.push((vec![words.concat()], token.clone()));
                }
                if let Some((last, head)) = words.split_last() {
                    for variant in number_variants(last) {
                        let mut varied = head.to_vec();
                        varied.push(variant);
                        generated.push((varied, token.clone()));
                    }
                }
                library.insert(&words, &token);
            }
        }

        for (words, token) in generated {
            library.insert(&words, &token);
        }

        debug!(
            entries = library.entries,
            phrases = library.phrases.len(),
            "Built keyword library"
        );
        Ok(library)
    }

    /// Build a library from a parsed library document.
    ///
    /// # Errors
    ///
    /// Returns [`KeywordLibraryError::Invalid`] for an unsupported version or
    /// a malformed entry.
    pub fn from_file(file: KeywordLibraryFile) -> Result<Self, KeywordLibraryError> {
        if file.version != KEYWORD_LIBRARY_VERSION {
            return Err(KeywordLibraryError::Invalid(format!(
                "unsupported keyword library version {} (expected {})",
                file.version, KEYWORD_LIBRARY_VERSION
            )));
        }
        Self::from_entries(file.keywords)
    }

    /// Load a library from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse or validation error. The caller's current
    /// library is untouched on failure.
    pub fn load(path: &Path) -> Result<Self, KeywordLibraryError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| KeywordLibraryError::Io {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let file: KeywordLibraryFile =
            serde_json::from_str(&content).map_err(|e| KeywordLibraryError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::from_file(file)
    }

    /// First insertion wins.
    fn insert(&mut self, words: &[String], token: &str) {
        let key = words.join(" ");
        self.phrases.entry(key).or_insert_with(|| token.to_string());
        self.max_phrase_len = self.max_phrase_len.max(words.len());
    }

    /// Canonical token for a word sequence, if it is a known surface form.
    pub fn lookup(&self, words: &[String]) -> Option<&str> {
        if words.is_empty() || words.len() > self.max_phrase_len {
            return None;
        }
        self.phrases.get(&words.join(" ")).map(String::as_str)
    }

    /// Longest surface form, in words.
    pub fn max_phrase_len(&self) -> usize {
        self.max_phrase_len
    }

    /// Number of canonical entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    /// True when the library has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Generation assigned by the handle that published this snapshot.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug)]
struct HandleInner {
    current: RwLock<Arc<KeywordLibrary>>,
    next_generation: AtomicU64,
}

/// Shared, swappable keyword library.
///
/// Readers take an `Arc` snapshot; the lock is held only for the pointer
/// clone or swap, never while normalizing.
#[derive(Debug, Clone)]
pub struct KeywordLibraryHandle {
    inner: Arc<HandleInner>,
}

impl KeywordLibraryHandle {
    /// Publish `library` as generation 1.
    pub fn new(mut library: KeywordLibrary) -> Self {
        library.generation = 1;
        Self {
            inner: Arc::new(HandleInner {
                current: RwLock::new(Arc::new(library)),
                next_generation: AtomicU64::new(2),
            }),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<KeywordLibrary> {
        let guard = self
            .inner
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swap in a new library. Returns its generation.
    pub fn replace(&self, mut library: KeywordLibrary) -> u64 {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::AcqRel);
        library.generation = generation;
        let fresh = Arc::new(library);
        let mut guard = self
            .inner
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = fresh;
        generation
    }

    /// Reload from disk and swap in the result.
    ///
    /// # Errors
    ///
    /// Returns the load error; the previous snapshot stays published.
    pub fn reload_from_path(&self, path: &Path) -> Result<u64, KeywordLibraryError> {
        let library = KeywordLibrary::load(path)?;
        let entries = library.len();
        let generation = self.replace(library);
        info!(
            path = %path.display(),
            entries,
            generation,
            "Keyword library reloaded"
        );
        Ok(generation)
    }
}

impl Default for KeywordLibraryHandle {
    fn default() -> Self {
        Self::new(KeywordLibrary::empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        split_words(text)
    }

    fn library() -> KeywordLibrary {
        KeywordLibrary::from_entries(vec![
            KeywordEntry::new("fire team").with_alias("squad"),
            KeywordEntry::new("overwatch"),
            KeywordEntry::new("casualty"),
            KeywordEntry::new("rally point"),
        ])
        .unwrap()
    }

    #[test]
    fn test_split_words_variants_agree() {
        assert_eq!(words("Fire-Team"), vec!["fire", "team"]);
        assert_eq!(words("fire_team"), vec!["fire", "team"]);
        assert_eq!(words("fire   team"), vec!["fire", "team"]);
    }

    #[test]
    fn test_number_variants() {
        assert!(number_variants("casualty").contains(&"casualties".to_string()));
        assert!(number_variants("casualties").contains(&"casualty".to_string()));
        assert!(number_variants("match").contains(&"matches".to_string()));
        assert!(number_variants("matches").contains(&"match".to_string()));
        assert!(number_variants("teams").contains(&"team".to_string()));
        assert!(!number_variants("class").contains(&"clas".to_string()));
    }

    #[test]
    fn test_lookup_phrases_and_variants() {
        let lib = library();
        assert_eq!(lib.lookup(&words("fire team")), Some("fire_team"));
        assert_eq!(lib.lookup(&words("fire-teams")), Some("fire_team"));
        assert_eq!(lib.lookup(&words("fireteam")), Some("fire_team"));
        assert_eq!(lib.lookup(&words("squads")), Some("fire_team"));
        assert_eq!(lib.lookup(&words("casualties")), Some("casualty"));
        assert_eq!(lib.lookup(&words("rally")), None);
        assert_eq!(lib.max_phrase_len(), 2);
        assert_eq!(lib.len(), 4);
    }

    #[test]
    fn test_exact_form_beats_generated_variant() {
        // "orders" is generated from "order" but is also an exact keyword.
        let lib = KeywordLibrary::from_entries(vec![
            KeywordEntry::new("order"),
            KeywordEntry::new("orders"),
        ])
        .unwrap();
        assert_eq!(lib.lookup(&words("orders")), Some("orders"));
        assert_eq!(lib.lookup(&words("order")), Some("order"));
    }

    #[test]
    fn test_rejects_empty_canonical() {
        let err = KeywordLibrary::from_entries(vec![KeywordEntry::new("  --  ")]).unwrap_err();
        assert!(matches!(err, KeywordLibraryError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let file = KeywordLibraryFile {
            version: 7,
            keywords: vec![],
        };
        assert!(KeywordLibrary::from_file(file).is_err());
    }

    #[test]
    fn test_handle_swap_keeps_old_snapshot() {
        let handle = KeywordLibraryHandle::new(KeywordLibrary::empty());
        let before = handle.snapshot();
        assert_eq!(before.generation(), 1);

        let generation = handle.replace(library());
        assert_eq!(generation, 2);

        assert!(before.is_empty());
        let after = handle.snapshot();
        assert_eq!(after.generation(), 2);
        assert_eq!(after.lookup(&words("squad")), Some("fire_team"));
    }

    #[test]
    fn test_reload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.json");
        std::fs::write(
            &path,
            r#"{"version":1,"keywords":[{"canonical":"overwatch","aliases":["ow"]}]}"#,
        )
        .unwrap();

        let handle = KeywordLibraryHandle::default();
        let generation = handle.reload_from_path(&path).unwrap();
        assert_eq!(generation, 2);
        assert_eq!(handle.snapshot().lookup(&words("ow")), Some("overwatch"));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            handle.reload_from_path(&path),
            Err(KeywordLibraryError::Parse { .. })
        ));
        assert_eq!(handle.snapshot().generation(), 2);
    }
}
