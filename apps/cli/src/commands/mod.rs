//! Command implementations for the LCM CLI.

pub mod init_run;
pub mod list;
pub mod prepare;
pub mod sbatch;
pub mod schedule;
pub mod show;
pub mod validate;

use crate::config::CliConfig;
use anyhow::Context;
use lcm_training::{InvocationContext, RecipeDocument, Registries, ResolvedRun, TrainingRunConfig, parse_overrides};
use std::path::{Path, PathBuf};

/// Overrides and output directory shared by the recipe commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Override a recipe value (`key=value`, `+key=value`, `~key`)
    #[arg(short = 'o', long = "override", value_name = "OVERRIDE")]
    pub overrides: Vec<String>,

    /// Run output directory (replaces `output_dir: ??`)
    #[arg(long, env = "LCM_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

impl ContextArgs {
    /// Config-file overrides first, then command-line ones.
    pub fn invocation_context(&self, config: &CliConfig) -> anyhow::Result<InvocationContext> {
        let raw: Vec<&str> = config.overrides.iter().chain(&self.overrides).map(String::as_str).collect();
        let overrides = parse_overrides(&raw)?;
        Ok(InvocationContext {
            output_dir: self.output_dir.clone().or_else(|| config.output_dir.clone()),
            overrides,
        })
    }
}

pub fn load_recipe(path: &Path) -> anyhow::Result<RecipeDocument> {
    RecipeDocument::load(path).with_context(|| format!("Failed to load recipe {}", path.display()))
}

/// Typed training config after overrides. `output_dir` may still be unset.
pub fn training_config(
    recipe: &RecipeDocument,
    context: &ContextArgs,
    config: &CliConfig,
) -> anyhow::Result<TrainingRunConfig> {
    let ctx = context.invocation_context(config)?;
    let applied = lcm_training::resolve::apply_context(recipe, &ctx)?;
    Ok(applied.training_config()?)
}

/// Fully resolved run; fails while `output_dir` is unset.
pub fn resolve_run(path: &Path, context: &ContextArgs, config: &CliConfig) -> anyhow::Result<ResolvedRun> {
    let recipe = load_recipe(path)?;
    let ctx = context.invocation_context(config)?;
    lcm_training::resolve(&recipe, &ctx, &Registries::default())
        .with_context(|| format!("Failed to resolve {}", path.display()))
}
