//! Recipe validation command.

use super::{ContextArgs, load_recipe};
use crate::config::CliConfig;
use colored::Colorize;
use lcm_training::{InvocationContext, PrepareJobConfig, Registries, parse_overrides};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct RecipeCheck {
    path: PathBuf,
    package: Option<String>,
    valid: bool,
    error: Option<String>,
    warnings: Vec<String>,
    /// `None` for recipes without a run output directory.
    output_dir_set: Option<bool>,
}

/// Execute the validate command.
pub async fn execute(paths: Vec<PathBuf>, context: &ContextArgs, config: &CliConfig, json: bool) -> anyhow::Result<()> {
    let registries = Registries::default();
    let checks: Vec<RecipeCheck> = paths.iter().map(|path| check(path, context, config, &registries)).collect();
    let failed = checks.iter().filter(|c| !c.valid).count();

    if json {
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({
            "total": checks.len(),
            "valid": checks.len() - failed,
            "invalid": failed,
            "results": checks,
        }))?);
    } else {
        output_human(&checks);
    }

    if failed > 0 {
        anyhow::bail!("{} of {} recipe(s) failed validation", failed, checks.len());
    }
    Ok(())
}

fn check(path: &Path, context: &ContextArgs, config: &CliConfig, registries: &Registries) -> RecipeCheck {
    let mut result =
        RecipeCheck { path: path.to_path_buf(), package: None, valid: false, error: None, warnings: Vec::new(), output_dir_set: None };

    let outcome = (|| -> anyhow::Result<()> {
        let recipe = load_recipe(path)?;
        result.package = recipe.package().map(str::to_string);

        if recipe.package() == Some("prepare") {
            // Config-file overrides target training recipes only.
            let ctx = InvocationContext { output_dir: None, overrides: parse_overrides(&context.overrides)? };
            let job: PrepareJobConfig = lcm_training::resolve::apply_context(&recipe, &ctx)?.parse_as()?;
            job.validate()?;
            result.output_dir_set = Some(!job.output.dir.is_missing() || context.output_dir.is_some());
            return Ok(());
        }

        let training = super::training_config(&recipe, context, config)?;
        let report = training.validate(registries)?;
        result.warnings = report.warnings;
        result.output_dir_set = Some(!training.output_dir.is_missing());
        Ok(())
    })();

    match outcome {
        Ok(()) => result.valid = true,
        Err(e) => result.error = Some(format!("{e:#}")),
    }
    result
}

fn output_human(checks: &[RecipeCheck]) {
    println!("{}", "lcm validate".bold().cyan());
    println!();

    for check in checks {
        let path = check.path.display().to_string();
        if check.valid {
            println!("  {} {}", "✓".green(), path);
        } else {
            println!("  {} {}", "✗".red(), path.red());
        }
        if let Some(error) = &check.error {
            println!("      {}", error.red());
        }
        for warning in &check.warnings {
            println!("      {} {}", "!".yellow(), warning.yellow());
        }
        if check.valid && check.output_dir_set == Some(false) {
            println!("      {}", "output directory is unset (`??`); pass --output-dir at launch".dimmed());
        }
    }

    let valid = checks.iter().filter(|c| c.valid).count();
    println!();
    println!("  {}/{} valid", valid, checks.len());
}
