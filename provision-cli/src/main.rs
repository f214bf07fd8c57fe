//! infocall-setup - provisioning command line for the InfoCall stack
//!
//! Main entry point for the `infocall-setup` tool.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use provision::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "infocall-setup")]
#[command(about = "Checkpointed, resumable provisioning for the InfoCall stack", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (defaults to /etc/infocall/provision.toml when present)
    #[arg(short, long, global = true, env = "INFOCALL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline, resuming from checkpoints
    Run(RunArgs),

    /// Run a single stage
    Stage {
        /// Stage name
        name: String,
        /// Run even if the stage already completed
        #[arg(short, long)]
        force: bool,
    },

    /// Show every stage with its checkpoint time
    Status,

    /// Remove checkpoints so stages run again
    Reset {
        /// Stage name
        #[arg(required_unless_present = "all")]
        name: Option<String>,
        /// Remove every checkpoint
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Start at this stage instead of the first
    #[arg(long)]
    from: Option<String>,
    /// Skip completed stages without asking
    #[arg(long, conflicts_with = "rerun_completed")]
    skip_completed: bool,
    /// Run completed stages again without asking
    #[arg(long)]
    rerun_completed: bool,
}

impl RunArgs {
    fn policy(&self) -> RerunPolicy {
        if self.skip_completed {
            RerunPolicy::SkipCompleted
        } else if self.rerun_completed {
            RerunPolicy::RerunCompleted
        } else {
            RerunPolicy::Ask
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let outcome = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")
        .and_then(|runtime| runtime.block_on(execute(cli)));

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("failed to load configuration")?;

    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(FileCheckpointStore::new(config.checkpoint_dir()));
    let pipeline = default_pipeline(checkpoints)?;

    match cli.command {
        Commands::Status => print_status(&pipeline),
        Commands::Reset { name: Some(name), .. } => {
            if pipeline.reset(&name)? {
                println!("Checkpoint for '{name}' removed.");
            } else {
                println!("Stage '{name}' had no checkpoint.");
            }
            Ok(())
        }
        Commands::Reset { name: None, .. } => {
            let removed = pipeline.reset_all()?;
            println!("{removed} checkpoint(s) removed.");
            Ok(())
        }
        Commands::Run(args) => {
            let pipeline = pipeline.with_rerun_policy(args.policy());
            provision(pipeline, config, Target::Remaining(args.from)).await
        }
        Commands::Stage { name, force } => provision(pipeline, config, Target::Single { name, force }).await,
    }
}

/// What a provisioning command runs.
enum Target {
    /// Every stage, or the stages from the named one onward.
    Remaining(Option<String>),
    /// Exactly one stage.
    Single { name: String, force: bool },
}

/// Runs `target` with the run log attached, recording a fatal error in the
/// log before returning it.
async fn provision(pipeline: Pipeline, config: ProvisionConfig, target: Target) -> Result<()> {
    let log_path = config.run_log_path();
    let log = Arc::new(
        RunLog::open(&log_path).with_context(|| format!("failed to open run log {}", log_path.display()))?,
    );
    let pipeline = pipeline.with_event_sink(log.clone());
    let mut ctx = StageContext::new(Arc::new(config), Gateways::system(), Box::new(TerminalPrompter::new()));
    let run_id = ctx.run_id().to_string();
    debug!(%run_id, stages = ?pipeline.stage_names(), "Starting provisioning run");

    let outcome = match &target {
        Target::Remaining(Some(from)) => pipeline.run_from(from, &mut ctx).await,
        Target::Remaining(None) => pipeline.run(&mut ctx).await,
        Target::Single { name, force } => pipeline.run_stage(name, *force, &mut ctx).await,
    };

    match outcome {
        Ok(report) => {
            println!(
                "Done: {} stage(s) run, {} skipped. Log: {}",
                report.executed(),
                report.skipped(),
                log.path().display()
            );
            Ok(())
        }
        Err(e) => {
            // The console already shows the failure through the run log
            // events and `main`.
            log.append_to_file(&run_id, &format!("FATAL: {e}"));
            Err(e.into())
        }
    }
}

fn print_status(pipeline: &Pipeline) -> Result<()> {
    for stage in pipeline.status()? {
        let when = stage.completed_at.map_or_else(
            || "pending".to_string(),
            |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
        println!("{:>2}. {:<14} {:<23} {}", stage.ordinal, stage.name, when, stage.description);
    }
    Ok(())
}
