//! Shared test utilities for hoplite-cli integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get a Command for the hoplite binary with color and ambient env cleared.
///
/// # Panics
///
/// Panics if the hoplite binary cannot be found.
#[allow(deprecated)]
pub fn hoplite_cmd() -> Command {
    let mut cmd = Command::cargo_bin("hoplite").expect("hoplite binary should exist");
    cmd.env_remove("HOPLITE_CONFIG")
        .env_remove("HOPLITE_STORE")
        .env_remove("HOPLITE_LOG")
        .env_remove("HOPLITE_VERBOSE")
        .env("HOPLITE_COLOR", "never");
    cmd
}

/// Write a config file into `dir` and return its path.
pub fn write_config(dir: &Path, yaml: &str) -> PathBuf {
    let path = dir.join("config.yaml");
    fs::write(&path, yaml).expect("write config");
    path
}

/// A config whose embedder points at a port nothing listens on.
pub const UNREACHABLE_EMBEDDER: &str = "embedder:\n  baseUrl: http://127.0.0.1:9\n  dimension: 3\n  timeoutMs: 1000\njudge:\n  baseUrl: http://127.0.0.1:9\n";

/// Write a keyword library mapping "reaction fire" to "overwatch".
pub fn write_keywords(dir: &Path) -> PathBuf {
    let path = dir.join("keywords.json");
    fs::write(
        &path,
        r#"{"version":1,"keywords":[{"canonical":"overwatch","aliases":["reaction fire"]},{"canonical":"fire team"}]}"#,
    )
    .expect("write keywords");
    path
}

/// An empty chunk store file.
pub fn empty_store(dir: &Path) -> PathBuf {
    let path = dir.join("rules.jsonl");
    fs::write(&path, "").expect("write store");
    path
}
