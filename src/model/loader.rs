use std::path::PathBuf;

use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use tracing::info;

use crate::error::{InferenceError, Result};

pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
}

/// Fetches config, tokenizer and safetensors weights into the local hub cache.
///
/// Gemma checkpoints are gated, so anonymous downloads usually fail until a
/// token for an account that accepted the license is supplied.
pub fn download_model(model_id: &str, revision: &str, token: Option<&str>) -> Result<ModelFiles> {
    info!("Fetching {} (revision: {})", model_id, revision);

    // Without an explicit token the builder falls back to the cached login.
    let mut builder = ApiBuilder::new();
    if let Some(t) = token {
        builder = builder.with_token(Some(t.to_string()));
    }
    let api = builder
        .build()
        .map_err(|e| InferenceError::Hub(e.to_string()))?;

    let repo = api.repo(Repo::with_revision(
        model_id.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config = fetch(&repo, "config.json")?;
    let tokenizer = fetch(&repo, "tokenizer.json")?;
    let weights = fetch_weights(&repo)?;

    info!(
        "Model files ready: config={:?}, tokenizer={:?}, weights={} files",
        config,
        tokenizer,
        weights.len()
    );

    Ok(ModelFiles {
        config,
        tokenizer,
        weights,
    })
}

fn fetch(repo: &ApiRepo, filename: &str) -> Result<PathBuf> {
    info!("Downloading {}...", filename);
    repo.get(filename)
        .map_err(|e| InferenceError::Hub(format!("Failed to download {}: {}", filename, e)))
}

/// Single-file checkpoints first, then the shards listed in the index.
fn fetch_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>> {
    if let Ok(path) = repo.get("model.safetensors") {
        return Ok(vec![path]);
    }

    let index_path = fetch(repo, "model.safetensors.index.json")?;
    let index: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(index_path)?)?;
    let shards = shard_names(&index);
    if shards.is_empty() {
        return Err(InferenceError::Hub(
            "Could not find model weights (tried model.safetensors and the shard index)".to_string(),
        ));
    }

    shards.iter().map(|name| fetch(repo, name)).collect()
}

fn shard_names(index: &serde_json::Value) -> Vec<String> {
    let mut names: Vec<String> = index
        .get("weight_map")
        .and_then(|m| m.as_object())
        .map(|m| {
            m.values()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names.dedup();
    names
}
