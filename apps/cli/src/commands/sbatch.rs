//! sbatch script rendering and submission for training recipes.

use super::{ContextArgs, resolve_run};
use crate::config::CliConfig;
use anyhow::Context;
use colored::Colorize;
use lcm_training::{JobSubmission, Launcher, RunLayout, SlurmLauncher, init_run};
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct SbatchOptions {
    pub write: Option<PathBuf>,
    pub submit: bool,
    pub partition: Option<String>,
    pub command: Vec<String>,
}

fn job_name(path: &Path) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let stem: String = stem.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    format!("lcm_{stem}")
}

pub async fn execute(path: PathBuf, context: &ContextArgs, config: &CliConfig, options: SbatchOptions) -> anyhow::Result<()> {
    let run = resolve_run(&path, context, config)?;
    let layout = RunLayout::new(&run.output_dir);

    let command = if options.command.is_empty() {
        vec![
            "python".to_string(),
            "-m".to_string(),
            "lcm.train".to_string(),
            "--config".to_string(),
            layout.resolved_config_path().to_string_lossy().into_owned(),
        ]
    } else {
        options.command
    };

    let job = JobSubmission::new(job_name(&path), run.config.requirements.clone(), command)
        .with_partition(options.partition)
        .with_log_dir(layout.slurm_dir());

    if options.write.is_none() && !options.submit {
        print!("{}", job.render_sbatch(&layout.slurm_dir())?);
        return Ok(());
    }

    // The job reads resolved_config.yaml, so the run directory must exist before the script does.
    let manifest = init_run(&run).context("Failed to initialize run directory")?;
    println!("{} {} ({})", "Initialized".green(), layout.resolved_config_path().display(), manifest.run_id);

    let script_dir = options.write.unwrap_or_else(|| layout.slurm_dir());
    let receipt = SlurmLauncher::new(script_dir, options.submit).submit(&job).await?;

    println!("{} {}", "Wrote".green(), receipt.script_path.display());
    if let Some(job_id) = receipt.job_id {
        println!("{} {}", "Submitted job".green(), job_id.cyan());
    }
    Ok(())
}
