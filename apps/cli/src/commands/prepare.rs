//! Data preparation job planning.

use super::load_recipe;
use anyhow::Context;
use colored::Colorize;
use lcm_training::prepare::SplitSpec;
use lcm_training::{Device, Launcher, PrepareJobConfig, device_for_worker, launcher_for};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct PreparePlan<'a> {
    name: &'a str,
    input: String,
    split: SplitSpec,
    rows: Option<u64>,
    sentence_columns: Vec<String>,
    output_dir: &'a PathBuf,
    cluster: String,
    /// Device of each task on the first node.
    devices: Vec<Device>,
    script_path: PathBuf,
}

pub async fn execute(path: PathBuf, output_dir: Option<PathBuf>, json: bool, command: Vec<String>) -> anyhow::Result<()> {
    let recipe = load_recipe(&path)?;
    if let Some(package) = recipe.package() {
        if package != "prepare" {
            anyhow::bail!("{} is a `{}` recipe, not a preparation job", path.display(), package);
        }
    }

    let mut job: PrepareJobConfig = recipe.parse_as()?;
    if let Some(dir) = output_dir {
        job = job.with_output_dir(dir);
    }
    job.validate()?;
    let out_dir = job.output_dir()?.clone();

    let command = if command.is_empty() {
        vec![
            "python".to_string(),
            "-m".to_string(),
            "lcm.datasets.prepare".to_string(),
            path.to_string_lossy().into_owned(),
        ]
    } else {
        command
    };
    let submission = job.submission(command)?;
    let launcher = launcher_for(job.launcher.cluster, out_dir.join("launch"), false);
    let receipt = launcher.submit(&submission).await.context("Failed to write launch script")?;

    let split = job.split_spec()?;
    let plan = PreparePlan {
        name: &job.name,
        input: match &job.input.data_dir {
            Some(data_dir) => format!("{} ({data_dir})", job.input.input_file),
            None => job.input.input_file.clone(),
        },
        rows: split.row_count(),
        split,
        sentence_columns: job.sentence_columns(),
        output_dir: &out_dir,
        cluster: job.launcher.cluster.to_string(),
        devices: (0..u64::from(job.requirements.tasks_per_node))
            .map(|worker| device_for_worker(worker, job.requirements.gpus_per_node))
            .collect(),
        script_path: receipt.script_path,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("Preparation job {}", plan.name).bold().cyan());
    println!("  Input:    {} [{}]", plan.input, plan.split);
    if let Some(rows) = plan.rows {
        println!("  Rows:     {rows}");
    }
    println!("  Embeds:   {}", plan.sentence_columns.join(", "));
    println!("  Output:   {}", plan.output_dir.display());
    println!(
        "  Devices:  {}",
        plan.devices.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    );
    println!("  Launcher: {}", plan.cluster);
    println!("  Script:   {}", plan.script_path.display().to_string().dimmed());
    println!();
    Ok(())
}
