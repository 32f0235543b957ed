//! Rocket Optimizer - engine simulation and fuel-mixture optimization service
//!
//! # Usage
//!
//! ```bash
//! # Serve the HTTP API (default 0.0.0.0:8000)
//! cargo run --release
//!
//! # Run one experiment offline and print the results as JSON
//! cargo run --release -- run --o-f-ratio 3.5 --pressure 5 --temp 3000 --isp 300
//! ```
//!
//! # Environment Variables
//!
//! - `ROCKET_CONFIG`: Path to a TOML config file (default: ./rocket_config.toml)
//! - `RUST_LOG`: Logging level (default: info)
//! - `RESET_DB`: Set to "true" to wipe all persistent data on startup (for testing)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rocket_optimizer::config::AppConfig;
use rocket_optimizer::engine::{explain_run, Explanation};
use rocket_optimizer::jobs::{run_cleanup_loop, JobQueue};
use rocket_optimizer::ml_engine::ModelCache;
use rocket_optimizer::pipeline::{execute_experiment, AppState};
use rocket_optimizer::storage::{ExperimentStore, SledStore};
use rocket_optimizer::types::{ExperimentParams, ExperimentResults, DEFAULT_ALPHA, DEFAULT_MAX_TEMP};
use rocket_optimizer::create_app;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rocket-optimizer")]
#[command(about = "Rocket engine simulation and fuel-mixture optimization service")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long, env = "ROCKET_ADDR")]
    addr: Option<String>,

    /// Path to a TOML config file (overrides the standard search order)
    #[arg(short, long, env = "ROCKET_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent experiment workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Directory for the experiment database and persisted models
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Reset all persistent data (experiments, results, models) on startup.
    /// WARNING: This is destructive and cannot be undone!
    /// Can also be set via RESET_DB=true environment variable.
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run one experiment in-process and print the results as JSON
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Oxidizer-to-fuel mass ratio [2, 6]
    #[arg(long)]
    o_f_ratio: f64,
    /// Chamber pressure in MPa [1, 10]
    #[arg(long)]
    pressure: f64,
    /// Combustion temperature in K [2500, 5000]
    #[arg(long)]
    temp: f64,
    /// Specific impulse in s [200, 450]
    #[arg(long)]
    isp: f64,
    /// Thrust/temperature trade-off weight [0, 1]
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    alpha: f64,
    /// Temperature ceiling for the optimizer in K
    #[arg(long, default_value_t = DEFAULT_MAX_TEMP)]
    max_temp: f64,
    /// Skip the optimization step
    #[arg(long)]
    no_optimize: bool,
    /// Use the hyperparameter-tuned model
    #[arg(long)]
    tune_model: bool,
    /// Let the optimizer search specific impulse too
    #[arg(long)]
    optimize_isp: bool,
    /// Include a plain-language explanation in the output
    #[arg(long)]
    explain: bool,
}

impl RunArgs {
    fn to_params(&self) -> ExperimentParams {
        let mut params = ExperimentParams::new(self.o_f_ratio, self.pressure, self.temp, self.isp);
        params.alpha = (!self.no_optimize).then_some(self.alpha);
        params.max_temp = Some(self.max_temp);
        params.tune_model = Some(self.tune_model);
        params.optimize_isp = self.optimize_isp.then_some(true);
        params
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Load the config file, then apply CLI overrides and re-validate.
fn resolve_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load(),
    };

    if let Some(addr) = &args.addr {
        config.server.addr.clone_from(addr);
    }
    if let Some(workers) = args.workers {
        config.workers.count = workers;
    }
    if let Some(data_dir) = &args.data_dir {
        config.server.data_dir.clone_from(data_dir);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ============================================================================
// Database Reset
// ============================================================================

/// Check if database reset is requested via CLI flag or environment variable.
fn should_reset_db(cli_flag: bool) -> bool {
    if cli_flag {
        return true;
    }
    std::env::var("RESET_DB")
        .map(|val| matches!(val.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Remove the data directory and all its contents.
fn reset_data_directory(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        info!("Data directory does not exist, nothing to reset");
        return Ok(());
    }

    warn!(path = %data_dir.display(), "RESET_DB detected, wiping all persistent data");
    if let Ok(entries) = std::fs::read_dir(data_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let kind = if path.is_dir() { "DIR " } else { "FILE" };
            warn!("    {} {}", kind, path.display());
        }
    }

    std::fs::remove_dir_all(data_dir).context("Failed to remove data directory")?;
    warn!("Data directory removed; a fresh database will be created");
    Ok(())
}

// ============================================================================
// Task Names for Supervisor Logging
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    JobCleanup,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpServer => write!(f, "HttpServer"),
            Self::JobCleanup => write!(f, "JobCleanup"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Spawn the periodic job cleanup task into the JoinSet.
fn spawn_job_cleanup(
    task_set: &mut JoinSet<Result<TaskName>>,
    queue: Arc<JobQueue>,
    config: &AppConfig,
    cancel_token: CancellationToken,
) {
    let interval = config.jobs.cleanup_interval();
    let max_age = config.jobs.max_age();
    task_set.spawn(async move {
        run_cleanup_loop(queue, interval, max_age, cancel_token).await;
        Ok(TaskName::JobCleanup)
    });
}

/// Monitor tasks until shutdown; a failed or panicked task cancels the rest.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: task {} completed", task_name);
            }
            Ok(Err(e)) => {
                error!("Supervisor: task failed with error: {}", e);
                cancel_token.cancel();
                return Err(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    info!("Supervisor: all tasks completed");
    Ok(())
}

// ============================================================================
// Modes
// ============================================================================

async fn serve(config: AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.server.data_dir).with_context(|| {
        format!(
            "Failed to create data directory {}",
            config.server.data_dir.display()
        )
    })?;

    let store: Arc<dyn ExperimentStore> = Arc::new(
        SledStore::open(config.db_path()).context("Failed to open experiment database")?,
    );
    let queue = Arc::new(JobQueue::new(config.workers.count));
    let models = Arc::new(ModelCache::new(config.cache_settings()));
    let state = AppState::new(
        Arc::clone(&queue),
        Arc::clone(&store),
        models,
        config.optimizer,
    );
    info!(
        workers = config.workers.count,
        impulse_mode = ?config.optimizer.impulse_mode,
        "Application state initialized"
    );

    let app = create_app(state, &config.server.cors_origins);
    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
    info!("HTTP server listening on {}", config.server.addr);

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    spawn_job_cleanup(&mut task_set, queue, &config, cancel_token.clone());

    let outcome = run_supervisor(&mut task_set, cancel_token).await;

    if let Err(e) = store.flush() {
        warn!(error = %e, "Failed to flush experiment store on shutdown");
    }
    info!("Shutdown complete");
    outcome
}

#[derive(Serialize)]
struct RunOutput {
    params: ExperimentParams,
    results: ExperimentResults,
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<Explanation>,
}

async fn run_offline(config: AppConfig, args: RunArgs) -> Result<()> {
    let params = args.to_params();
    let models = ModelCache::new(config.cache_settings());
    let optimizer = config.optimizer;

    let output = tokio::task::spawn_blocking(move || -> Result<RunOutput> {
        let progress = |p: f64, msg: &str| info!(progress = p, "{}", msg);
        let results = execute_experiment(&params, &models, &optimizer, &progress)
            .map_err(|fault| anyhow::anyhow!("Experiment failed ({}): {}", fault.category, fault))?;
        let explanation = args.explain.then(|| explain_run(&params, &results));
        Ok(RunOutput {
            params,
            results,
            explanation,
        })
    })
    .await
    .context("Experiment task panicked")??;

    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialize results")?
    );
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    let config = resolve_config(&args)?;

    // Reset DB check, before any storage initialization
    if should_reset_db(args.reset_db) {
        reset_data_directory(&config.server.data_dir)?;
    }

    match args.command {
        Some(SubCommand::Run(run_args)) => run_offline(config, run_args).await,
        None => {
            info!("Rocket Optimizer v{}", env!("CARGO_PKG_VERSION"));
            serve(config).await
        }
    }
}
