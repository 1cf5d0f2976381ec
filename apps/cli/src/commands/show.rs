//! Show a recipe after overrides, or the figures derived from it.

use super::{ContextArgs, load_recipe, training_config};
use crate::config::CliConfig;
use colored::Colorize;
use lcm_training::{RecipeDocument, Registries, RunSummary};
use std::path::PathBuf;

pub async fn execute(
    path: PathBuf,
    context: &ContextArgs,
    config: &CliConfig,
    format: &str,
    summary: bool,
) -> anyhow::Result<()> {
    if !matches!(format, "yaml" | "json") {
        anyhow::bail!("Unknown format: {}. Supported: yaml, json", format);
    }

    let recipe = load_recipe(&path)?;
    let training = training_config(&recipe, context, config)?;
    training.validate(&Registries::default())?;

    if summary {
        let summary = RunSummary::from_config(&training);
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        return Ok(());
    }

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&training)?);
    } else {
        let document = RecipeDocument::from_typed(recipe.package().map(str::to_string), &training)?;
        print!("{}", document.to_yaml_string()?);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("{}", "Run summary".bold().cyan());
    println!();
    println!("  Trainer:          {}", summary.trainer);
    println!("  Architecture:     {}", summary.model_arch.cyan());
    println!("  Criterion:        {}", summary.criterion);
    println!("  World size:       {} ranks, {} GPUs", summary.world_size, summary.total_gpus);
    println!("  Tokens per step:  {}", summary.tokens_per_step);
    println!("  Total tokens:     {}", summary.total_tokens);
    println!("  Steps:            {}", summary.max_steps);
    println!(
        "  LR:               {} {:e} -> {:e} ({:.1}% warmup)",
        summary.lr_schedule,
        summary.peak_lr,
        summary.final_lr,
        summary.warmup_fraction * 100.0
    );
    println!("  Checkpoints:      {}", summary.checkpoints);
    println!("  Model saves:      {}", summary.model_saves);
    println!("  Validations:      {}", summary.validations);
}
