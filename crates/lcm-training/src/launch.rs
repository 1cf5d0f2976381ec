//! Job submission: render a launch script for a resolved job and hand it to
//! a cluster backend.

use crate::error::{TrainingError, TrainingResult};
use crate::requirements::Requirements;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cluster {
    #[default]
    Local,
    Slurm,
}

impl std::fmt::Display for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Slurm => f.write_str("slurm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub name: String,
    pub requirements: Requirements,
    pub partition: Option<String>,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Where the scheduler writes stdout/stderr. Defaults to the script dir.
    pub log_dir: Option<PathBuf>,
}

fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-./=:,@%+".contains(c)
}

/// Quote a single word for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_shell_safe) {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}

fn shell_command(words: &[String]) -> String {
    words.iter().map(|w| shell_quote(w)).collect::<Vec<_>>().join(" ")
}

impl JobSubmission {
    #[must_use]
    pub fn new(name: impl Into<String>, requirements: Requirements, command: Vec<String>) -> Self {
        Self { name: name.into(), requirements, partition: None, command, env: BTreeMap::new(), log_dir: None }
    }

    #[must_use]
    pub fn with_partition(mut self, partition: Option<String>) -> Self {
        self.partition = partition;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    fn check(&self) -> TrainingResult<()> {
        if self.name.trim().is_empty() || !self.name.chars().all(is_shell_safe) {
            return Err(TrainingError::Launch(format!("invalid job name `{}`", self.name)));
        }
        if self.command.is_empty() {
            return Err(TrainingError::Launch("no command to launch".to_string()));
        }
        Ok(())
    }

    fn write_env(&self, script: &mut String) {
        for (key, value) in &self.env {
            let _ = writeln!(script, "export {key}={}", shell_quote(value));
        }
    }

    /// sbatch script: directives, log paths, environment, then `srun <command>`.
    pub fn render_sbatch(&self, default_log_dir: &Path) -> TrainingResult<String> {
        self.check()?;
        let log_dir = self.log_dir.as_deref().unwrap_or(default_log_dir);

        let mut script = String::from("#!/bin/bash\n");
        for line in self.requirements.sbatch_directives(Some(&self.name), self.partition.as_deref()) {
            script.push_str(&line);
            script.push('\n');
        }
        let _ = writeln!(script, "#SBATCH --output={}", log_dir.join("%j.out").display());
        let _ = writeln!(script, "#SBATCH --error={}", log_dir.join("%j.err").display());
        script.push('\n');
        self.write_env(&mut script);
        let _ = writeln!(script, "srun {}", shell_command(&self.command));
        Ok(script)
    }

    /// Plain shell script running the command once on this machine.
    pub fn render_local(&self) -> TrainingResult<String> {
        self.check()?;
        let mut script = String::from("#!/bin/bash\nset -euo pipefail\n\n");
        self.write_env(&mut script);
        script.push_str(&shell_command(&self.command));
        script.push('\n');
        Ok(script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchReceipt {
    pub launcher: &'static str,
    pub script_path: PathBuf,
    /// Scheduler job id when the script was submitted.
    pub job_id: Option<String>,
}

#[async_trait]
pub trait Launcher: Send + Sync {
    fn id(&self) -> &'static str;

    async fn submit(&self, job: &JobSubmission) -> TrainingResult<LaunchReceipt>;
}

/// Parse the job id out of `sbatch` stdout (`Submitted batch job 123`).
pub fn parse_sbatch_job_id(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let id = line.trim().strip_prefix("Submitted batch job")?.trim();
        (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
    })
}

async fn write_script(path: &Path, body: &str) -> TrainingResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).await?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SlurmLauncher {
    script_dir: PathBuf,
    submit: bool,
    sbatch_bin: String,
}

impl SlurmLauncher {
    #[must_use]
    pub fn new(script_dir: impl Into<PathBuf>, submit: bool) -> Self {
        Self { script_dir: script_dir.into(), submit, sbatch_bin: "sbatch".to_string() }
    }

    #[must_use]
    pub fn with_sbatch_bin(mut self, bin: impl Into<String>) -> Self {
        self.sbatch_bin = bin.into();
        self
    }

    #[must_use]
    pub fn script_path(&self, job: &JobSubmission) -> PathBuf {
        self.script_dir.join(format!("{}.sbatch", job.name))
    }
}

#[async_trait]
impl Launcher for SlurmLauncher {
    fn id(&self) -> &'static str {
        "slurm"
    }

    async fn submit(&self, job: &JobSubmission) -> TrainingResult<LaunchReceipt> {
        let script = job.render_sbatch(&self.script_dir)?;
        let script_path = self.script_path(job);
        write_script(&script_path, &script).await?;
        tracing::info!(path = %script_path.display(), "wrote sbatch script");

        if !self.submit {
            return Ok(LaunchReceipt { launcher: self.id(), script_path, job_id: None });
        }

        let output = Command::new(&self.sbatch_bin)
            .arg(&script_path)
            .output()
            .await
            .map_err(|e| TrainingError::Launch(format!("failed to run `{}`: {e}", self.sbatch_bin)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TrainingError::Launch(format!("sbatch rejected the job: {}", stderr.trim())));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = parse_sbatch_job_id(&stdout)
            .ok_or_else(|| TrainingError::Launch(format!("unexpected sbatch output: {}", stdout.trim())))?;
        tracing::info!(%job_id, "submitted job");
        Ok(LaunchReceipt { launcher: self.id(), script_path, job_id: Some(job_id) })
    }
}

/// Writes a runnable script; running it is left to the caller.
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    script_dir: PathBuf,
}

impl LocalLauncher {
    #[must_use]
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self { script_dir: script_dir.into() }
    }
}

#[async_trait]
impl Launcher for LocalLauncher {
    fn id(&self) -> &'static str {
        "local"
    }

    async fn submit(&self, job: &JobSubmission) -> TrainingResult<LaunchReceipt> {
        if job.requirements.world_size() > 1 {
            tracing::warn!(
                world_size = job.requirements.world_size(),
                "local launcher runs a single process; requirements are ignored"
            );
        }
        let script = job.render_local()?;
        let script_path = self.script_dir.join(format!("{}.sh", job.name));
        write_script(&script_path, &script).await?;
        tracing::info!(path = %script_path.display(), "wrote local launch script");
        Ok(LaunchReceipt { launcher: self.id(), script_path, job_id: None })
    }
}

pub fn launcher_for(cluster: Cluster, script_dir: impl Into<PathBuf>, submit: bool) -> Box<dyn Launcher> {
    match cluster {
        Cluster::Local => Box::new(LocalLauncher::new(script_dir)),
        Cluster::Slurm => Box::new(SlurmLauncher::new(script_dir, submit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn job() -> JobSubmission {
        let requirements =
            Requirements { nodes: 4, tasks_per_node: 8, gpus_per_node: 8, cpus_per_task: 32, mem_gb: 0, timeout_min: 10000 };
        JobSubmission::new("lcm_mse", requirements, vec!["python".into(), "-m".into(), "lcm.train".into(), "+pretrain=mse".into()])
            .with_env("OUTPUT_DIR", "/checkpoints/my run")
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("output_dir=/tmp/x"), "output_dir=/tmp/x");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_render_sbatch() {
        let script = job().render_sbatch(Path::new("/logs")).unwrap();
        assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=lcm_mse\n"));
        assert!(script.contains("#SBATCH --mem=0\n"));
        assert!(script.contains("#SBATCH --time=10000\n"));
        assert!(script.contains("#SBATCH --output=/logs/%j.out\n"));
        assert!(script.contains("export OUTPUT_DIR='/checkpoints/my run'\n"));
        assert!(script.trim_end().ends_with("srun python -m lcm.train +pretrain=mse"));
    }

    #[test]
    fn test_render_rejects_bad_jobs() {
        let mut bad = job();
        bad.command.clear();
        assert!(matches!(bad.render_local(), Err(TrainingError::Launch(_))));

        let mut bad = job();
        bad.name = "two words".to_string();
        assert!(bad.render_sbatch(Path::new("/logs")).is_err());
    }

    #[test]
    fn test_parse_sbatch_job_id() {
        assert_eq!(parse_sbatch_job_id("Submitted batch job 123456\n").as_deref(), Some("123456"));
        assert_eq!(parse_sbatch_job_id("warning: foo\nSubmitted batch job 7\n").as_deref(), Some("7"));
        assert_eq!(parse_sbatch_job_id("sbatch: error: invalid partition\n"), None);
    }

    #[tokio::test]
    async fn test_slurm_launcher_writes_script_without_submitting() {
        let temp = TempDir::new().unwrap();
        let launcher = SlurmLauncher::new(temp.path().join("slurm"), false);
        let receipt = launcher.submit(&job()).await.unwrap();

        assert_eq!(receipt.launcher, "slurm");
        assert_eq!(receipt.job_id, None);
        let script = std::fs::read_to_string(&receipt.script_path).unwrap();
        assert!(script.contains("#SBATCH --nodes=4"));
    }

    #[tokio::test]
    async fn test_slurm_launcher_reports_missing_sbatch() {
        let temp = TempDir::new().unwrap();
        let launcher = SlurmLauncher::new(temp.path(), true).with_sbatch_bin("/nonexistent/sbatch");
        let err = launcher.submit(&job()).await.unwrap_err();
        assert!(matches!(err, TrainingError::Launch(_)));
    }

    #[tokio::test]
    async fn test_local_launcher_writes_executable_script() {
        let temp = TempDir::new().unwrap();
        let launcher = launcher_for(Cluster::Local, temp.path(), true);
        let receipt = launcher.submit(&job()).await.unwrap();

        assert_eq!(launcher.id(), "local");
        assert!(receipt.script_path.ends_with("lcm_mse.sh"));
        let script = std::fs::read_to_string(&receipt.script_path).unwrap();
        assert!(script.contains("set -euo pipefail"));
        assert!(!script.contains("srun"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&receipt.script_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
