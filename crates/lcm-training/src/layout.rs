use crate::error::TrainingResult;
use std::path::{Path, PathBuf};

const CHECKPOINT_PREFIX: &str = "step_";

/// Filesystem layout of a training run under its `output_dir`.
///
/// ```text
/// <output_dir>/
///   checkpoints/step_<n>/
///   config_logs/
///   metrics/
///   slurm/
///   resolved_config.yaml
///   run_manifest.json
/// ```
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn checkpoints_dir(&self) -> PathBuf {
        self.root.join("checkpoints")
    }

    #[must_use]
    pub fn checkpoint_dir(&self, step: u64) -> PathBuf {
        self.checkpoints_dir().join(format!("{CHECKPOINT_PREFIX}{step}"))
    }

    #[must_use]
    pub fn config_logs_dir(&self) -> PathBuf {
        self.root.join("config_logs")
    }

    #[must_use]
    pub fn metrics_dir(&self) -> PathBuf {
        self.root.join("metrics")
    }

    #[must_use]
    pub fn slurm_dir(&self) -> PathBuf {
        self.root.join("slurm")
    }

    #[must_use]
    pub fn resolved_config_path(&self) -> PathBuf {
        self.root.join("resolved_config.yaml")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("run_manifest.json")
    }

    pub fn ensure_dirs(&self) -> TrainingResult<()> {
        for dir in [self.checkpoints_dir(), self.config_logs_dir(), self.metrics_dir(), self.slurm_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Steps of the `step_<n>` checkpoint directories present on disk, ascending.
    pub fn existing_checkpoint_steps(&self) -> TrainingResult<Vec<u64>> {
        let dir = self.checkpoints_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut steps = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let step = name.to_str().and_then(|n| n.strip_prefix(CHECKPOINT_PREFIX)).and_then(|n| n.parse().ok());
            if let Some(step) = step {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        Ok(steps)
    }
}
