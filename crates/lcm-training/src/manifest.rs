//! Run manifest written next to the resolved configuration.

use crate::config::ModelArch;
use crate::error::TrainingResult;
use crate::layout::RunLayout;
use crate::resolve::ResolvedRun;
use crate::trainer::TrainerEntryPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    /// Hash of `resolved_config.yaml` as written.
    pub config_sha256: String,
    pub trainer: TrainerEntryPoint,
    pub model_arch: ModelArch,
    pub world_size: u64,
    pub max_steps: u64,
}

impl RunManifest {
    pub fn load(layout: &RunLayout) -> TrainingResult<Self> {
        let text = std::fs::read_to_string(layout.manifest_path())?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub fn sha256_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Create the run directories, then write `resolved_config.yaml` and
/// `run_manifest.json`.
pub fn init_run(run: &ResolvedRun) -> TrainingResult<RunManifest> {
    let layout = RunLayout::new(&run.output_dir);
    layout.ensure_dirs()?;

    let resolved = run.to_document()?.to_yaml_string()?;
    std::fs::write(layout.resolved_config_path(), &resolved)?;

    let manifest = RunManifest {
        run_id: RunId::new(),
        created_at: Utc::now(),
        config_sha256: sha256_text(&resolved),
        trainer: run.config.trainer,
        model_arch: run.config.model_arch.clone(),
        world_size: run.config.requirements.world_size(),
        max_steps: run.config.max_steps,
    };
    std::fs::write(layout.manifest_path(), serde_json::to_string_pretty(&manifest)?)?;
    tracing::info!(run_id = %manifest.run_id, output_dir = %layout.root().display(), "initialized run directory");
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_text() {
        assert_eq!(sha256_text("abc"), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
