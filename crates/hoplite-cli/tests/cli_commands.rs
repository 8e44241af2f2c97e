//! Integration tests for the hoplite binary.
//!
//! None of these tests need a running model server: retrieval tests stop at
//! request validation, store opening or the first (refused) embedding call.

mod common;

use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

use common::{empty_store, hoplite_cmd, write_config, write_keywords, UNREACHABLE_EMBEDDER};

// ============================================================================
// Help and version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    hoplite_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("retrieve"))
        .stdout(predicate::str::contains("keywords"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_includes_package_version() {
    hoplite_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_retrieve_requires_query() {
    hoplite_cmd()
        .args(["retrieve", "--store", "rules.jsonl"])
        .assert()
        .failure();
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_show_yaml() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "retrieval:\n  fusion:\n    rrfK: 30\n");

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rrfK: 30"))
        .stdout(predicate::str::contains("minRelevance"));
}

#[test]
fn test_config_show_json() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "judge:\n  timeoutMs: 5000\n");

    let output = hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "show", "--json"])
        .output()
        .expect("run hoplite");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["judge"]["timeoutMs"], 5000);
    assert_eq!(json["retrieval"]["defaults"]["maxChunks"], 5);
}

#[test]
fn test_config_missing_file_uses_defaults() {
    let temp = TempDir::new().expect("create temp dir");

    hoplite_cmd()
        .arg("--config")
        .arg(temp.path().join("absent.yaml"))
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("built-in defaults"))
        .stdout(predicate::str::contains("[ok] Configuration is valid"));
}

#[test]
fn test_config_validate_reports_warnings() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "retrieval:\n  defaults:\n    minRelevance: 0.95\n");

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warn] 1 warning(s):"))
        .stdout(predicate::str::contains("minRelevance"));
}

#[test]
fn test_invalid_config_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "retrieval:\n  defaults:\n    maxChunks: 0\n");

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"))
        .stderr(predicate::str::contains("retrieval.defaults"));
}

// ============================================================================
// Keywords
// ============================================================================

#[test]
fn test_keywords_normalize_applies_aliases() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "");
    let keywords = write_keywords(temp.path());

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["keywords", "normalize", "Can I use reaction fire?", "--keywords"])
        .arg(&keywords)
        .assert()
        .success()
        .stdout(predicate::str::contains("overwatch"))
        .stdout(predicate::str::contains("reaction").not());
}

#[test]
fn test_keywords_normalize_json() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "");
    let keywords = write_keywords(temp.path());

    let output = hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["keywords", "normalize", "Each Fire-Team moves", "--json", "--keywords"])
        .arg(&keywords)
        .output()
        .expect("run hoplite");
    assert!(output.status.success());

    let tokens: Vec<String> = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(tokens, vec!["each", "fire_team", "moves"]);
}

#[test]
fn test_keywords_rejects_unknown_version() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), "");
    let keywords = temp.path().join("keywords.json");
    std::fs::write(&keywords, r#"{"version":7,"keywords":[]}"#).expect("write keywords");

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["keywords", "normalize", "overwatch", "--keywords"])
        .arg(&keywords)
        .assert()
        .failure()
        .stderr(predicate::str::contains("version 7"));
}

// ============================================================================
// Retrieve
// ============================================================================

#[test]
fn test_retrieve_missing_store_fails() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), UNREACHABLE_EMBEDDER);

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["retrieve", "Can I overwatch after dashing?", "--store"])
        .arg(temp.path().join("absent.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open chunk store"));
}

#[test]
fn test_retrieve_rejects_invalid_relevance() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), UNREACHABLE_EMBEDDER);
    let store = empty_store(temp.path());

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["retrieve", "Can I overwatch?", "--min-relevance", "1.5", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid request"));
}

#[test]
fn test_retrieve_rejects_too_many_hops() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), UNREACHABLE_EMBEDDER);
    let store = empty_store(temp.path());

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["retrieve", "Can I overwatch?", "--max-hops", "9", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid request"));
}

#[test]
fn test_retrieve_unreachable_embedder_is_backend_failure() {
    let temp = TempDir::new().expect("create temp dir");
    let config = write_config(temp.path(), UNREACHABLE_EMBEDDER);
    let store = empty_store(temp.path());

    hoplite_cmd()
        .arg("--config")
        .arg(&config)
        .args(["retrieve", "How far can a model move?", "--no-multi-hop", "--store"])
        .arg(&store)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backend failure"))
        .stderr(predicate::str::contains("embedder.baseUrl"));
}
