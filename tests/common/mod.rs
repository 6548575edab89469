//! Common test utilities and helpers

#![allow(dead_code)]

use bookbandit_core::{ArmId, ContextVector, RecommenderConfig};
use std::path::PathBuf;
use tempfile::TempDir;

/// Config rooted in a temporary directory (no top-N artifact, so d = 6)
pub fn create_test_config(batch_size: usize) -> (RecommenderConfig, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = RecommenderConfig {
        alpha: 1.0,
        batch_size,
        model_path: temp_dir.path().join("models").join("linucb_model.json"),
        item_config_path: temp_dir.path().join("item_config.json"),
    };
    (config, temp_dir)
}

/// Write a top-N artifact next to the config and return its path
pub fn write_top_n(
    temp_dir: &TempDir,
    categories: &[&str],
    authors: &[&str],
    publishers: &[&str],
) -> PathBuf {
    let path = temp_dir.path().join("item_config.json");
    let artifact = serde_json::json!({
        "version": "test",
        "top_categories": categories,
        "top_authors": authors,
        "top_publishers": publishers,
    });
    std::fs::write(&path, artifact.to_string()).expect("Failed to write top-N artifact");
    path
}

/// Deterministic pseudo-random context in [0, 1) of length `d`
pub fn context(d: usize, seed: u64) -> ContextVector {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..d)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        })
        .collect()
}

/// One context per candidate
pub fn contexts_for(candidates: &[ArmId], d: usize, seed: u64) -> Vec<ContextVector> {
    candidates
        .iter()
        .enumerate()
        .map(|(i, _)| context(d, seed + i as u64))
        .collect()
}
