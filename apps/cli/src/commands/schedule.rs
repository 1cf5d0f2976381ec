//! Learning-rate schedule and step cadence of a recipe.

use super::{ContextArgs, load_recipe, training_config};
use crate::config::CliConfig;
use colored::Colorize;
use lcm_training::{CadencePlan, LrScheduler, Registries, StepActions};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct SchedulePoint {
    step: u64,
    lr: f64,
    actions: StepActions,
}

pub async fn execute(
    path: PathBuf,
    context: &ContextArgs,
    config: &CliConfig,
    every: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let recipe = load_recipe(&path)?;
    let training = training_config(&recipe, context, config)?;
    training.validate(&Registries::default())?;

    let scheduler = LrScheduler::from_config(&training);
    let cadence = CadencePlan::from_config(&training);
    let every = every.unwrap_or_else(|| (training.max_steps / 10).max(1));
    if every == 0 {
        anyhow::bail!("--every must be positive");
    }

    let points: Vec<SchedulePoint> = scheduler
        .sample(every)
        .into_iter()
        .map(|(step, lr)| SchedulePoint { step, lr, actions: cadence.actions_at(step) })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    println!("{}", format!("{} schedule, {} steps", training.lr_schedule, training.max_steps).bold().cyan());
    println!();
    println!("  {:>10}  {:>12}  {}", "Step", "LR", "Actions");
    println!("  {}", "─".repeat(50));
    for point in &points {
        println!("  {:>10}  {:>12.4e}  {}", point.step, point.lr, describe(point.actions).dimmed());
    }
    println!();
    println!(
        "  {} checkpoints (keep last {}), {} model saves, {} validations",
        cadence.checkpoint_count(),
        cadence.keep_last_n,
        cadence.model_save_count(),
        cadence.validation_count()
    );
    Ok(())
}

fn describe(actions: StepActions) -> String {
    let names = [
        (actions.validate, "validate"),
        (actions.checkpoint, "checkpoint"),
        (actions.save_model, "save"),
        (actions.publish_metrics, "metrics"),
    ];
    names.iter().filter(|(fires, _)| *fires).map(|(_, name)| *name).collect::<Vec<_>>().join(", ")
}
