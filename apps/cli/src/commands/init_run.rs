//! Run directory initialization.

use super::{ContextArgs, resolve_run};
use crate::config::CliConfig;
use anyhow::Context;
use colored::Colorize;
use lcm_training::{CadencePlan, RunLayout, init_run};
use std::path::PathBuf;

pub async fn execute(path: PathBuf, context: &ContextArgs, config: &CliConfig) -> anyhow::Result<()> {
    let run = resolve_run(&path, context, config)?;
    let layout = RunLayout::new(&run.output_dir);

    let existing = layout.existing_checkpoint_steps().context("Failed to scan existing checkpoints")?;
    let manifest = init_run(&run).context("Failed to initialize run directory")?;

    println!();
    println!("{}", "Run initialized".bold().green());
    println!("  Run:       {}", manifest.run_id.to_string().cyan());
    println!("  Directory: {}", layout.root().display());
    println!("  Config:    {}", layout.resolved_config_path().display().to_string().dimmed());
    println!("  Manifest:  {}", layout.manifest_path().display().to_string().dimmed());

    if !existing.is_empty() {
        let retention = CadencePlan::from_config(&run.config).plan_retention(&existing);
        let latest = retention.keep.first().copied().unwrap_or_default();
        println!(
            "  {}",
            format!("Found {} checkpoint(s); the trainer resumes from step {}", existing.len(), latest).yellow()
        );
        for prune in &retention.prune {
            let note = if prune.keep_consolidated_model { " (consolidated model kept)" } else { "" };
            println!("    {}", format!("step_{} will be pruned{}", prune.step, note).dimmed());
        }
    }
    println!();
    Ok(())
}
