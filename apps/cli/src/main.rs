//! LCM CLI - Command-line interface for LCM training recipes
//!
//! This CLI provides an `lcm` command for validating, inspecting and
//! launching Large Concept Model training and data preparation recipes.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, shells};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{ContextArgs, init_run, list, prepare, sbatch, schedule, show, validate};

/// LCM CLI - Training recipes for Large Concept Models
#[derive(Parser, Debug)]
#[command(
    name = "lcm",
    author,
    version,
    about = "LCM - Training recipes for Large Concept Models",
    long_about = "Validate, inspect and launch LCM training recipes.\nRecipes are YAML documents with a `# @package` header; values marked `??` must be supplied at launch."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate one or more recipes
    ///
    /// Checks structure, registry references and invariants. Training and
    /// preparation recipes are told apart by their `# @package` header.
    Validate {
        /// Recipe files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        context: ContextArgs,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a recipe after overrides
    Show {
        /// Recipe file
        path: PathBuf,

        #[command(flatten)]
        context: ContextArgs,

        /// Output format (yaml, json)
        #[arg(long, default_value = "yaml")]
        format: String,

        /// Print derived run figures instead of the configuration
        #[arg(long)]
        summary: bool,
    },

    /// Render an sbatch script for a training recipe
    ///
    /// Prints the script unless `--write` or `--submit` is given.
    Sbatch {
        /// Recipe file
        path: PathBuf,

        #[command(flatten)]
        context: ContextArgs,

        /// Directory to write the script to (defaults to `<output_dir>/slurm`)
        #[arg(long)]
        write: Option<PathBuf>,

        /// Submit the script with `sbatch`
        #[arg(long)]
        submit: bool,

        /// SLURM partition
        #[arg(long)]
        partition: Option<String>,

        /// Command run by every task (defaults to the trainer entry point)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Print the learning-rate schedule and step cadence
    Schedule {
        /// Recipe file
        path: PathBuf,

        #[command(flatten)]
        context: ContextArgs,

        /// Sampling interval in steps (defaults to a tenth of max_steps)
        #[arg(long)]
        every: Option<u64>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the run directory with its resolved config and manifest
    InitRun {
        /// Recipe file
        path: PathBuf,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Plan a data preparation job and write its launch script
    Prepare {
        /// Preparation recipe file
        path: PathBuf,

        /// Output directory of the embedded dataset (replaces `output.dir: ??`)
        #[arg(long, env = "LCM_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,

        /// Command run by the job (defaults to the preparation pipeline)
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// List recipes under a directory
    List {
        /// Directory to scan (defaults to `recipes`)
        dir: Option<PathBuf>,
    },

    /// Generate shell completions (bash, zsh, fish, powershell, elvish)
    Completions {
        /// Target shell
        shell: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let (cli_config, config_problems) = config::load_config();

    // Initialize tracing
    let log_level = args.log_level.as_deref().or(cli_config.log_level.as_deref()).unwrap_or("info");
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    for problem in &config_problems {
        tracing::warn!("{problem}");
    }

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let json_default = cli_config.output.format == "json";

    match command {
        Command::Validate { paths, context, json } => {
            validate::execute(paths, &context, &cli_config, json || json_default).await?;
        }
        Command::Show { path, context, format, summary } => {
            show::execute(path, &context, &cli_config, &format, summary).await?;
        }
        Command::Sbatch { path, context, write, submit, partition, command } => {
            sbatch::execute(path, &context, &cli_config, sbatch::SbatchOptions { write, submit, partition, command })
                .await?;
        }
        Command::Schedule { path, context, every, json } => {
            schedule::execute(path, &context, &cli_config, every, json || json_default).await?;
        }
        Command::InitRun { path, context } => {
            init_run::execute(path, &context, &cli_config).await?;
        }
        Command::Prepare { path, output_dir, json, command } => {
            let output_dir = output_dir.or_else(|| cli_config.output_dir.clone());
            prepare::execute(path, output_dir, json || json_default, command).await?;
        }
        Command::List { dir } => {
            list::execute(dir.unwrap_or_else(|| PathBuf::from("recipes"))).await?;
        }
        Command::Completions { shell } => {
            let mut cmd = Args::command();
            let mut out = std::io::stdout();
            match shell.as_str() {
                "bash" => generate(shells::Bash, &mut cmd, "lcm", &mut out),
                "zsh" => generate(shells::Zsh, &mut cmd, "lcm", &mut out),
                "fish" => generate(shells::Fish, &mut cmd, "lcm", &mut out),
                "powershell" => generate(shells::PowerShell, &mut cmd, "lcm", &mut out),
                "elvish" => generate(shells::Elvish, &mut cmd, "lcm", &mut out),
                _ => anyhow::bail!("Unknown shell: {}. Supported: bash, zsh, fish, powershell, elvish", shell),
            }
        }
    }

    Ok(())
}
