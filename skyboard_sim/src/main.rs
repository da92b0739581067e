//! Skyboard CLI
//!
//! Runs the drone arena with keys read from stdin.

use clap::Parser;
use skyboard_core::{SimParams, Snapshot};
use skyboard_env::TokioContext;
use skyboard_sim::{run_exporter, run_system, SnapshotExporter, SystemConfig, SystemError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Skyboard drone arena
#[derive(Parser, Debug)]
#[command(name = "skyboard")]
#[command(about = "Keyboard-driven drone arena with potential-field assist and a watchdog", long_about = None)]
struct Args {
    /// Parameter file (key = value lines)
    #[arg(short, long, default_value = "params.txt")]
    params: String,

    /// Master seed for obstacle/target placement (0 = random)
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Append every snapshot to this file as JSON lines
    #[arg(long)]
    export: Option<String>,

    /// Seconds between obstacle batches
    #[arg(long, default_value = "45", value_parser = parse_interval)]
    obstacle_interval: Duration,

    /// Seconds between target batches
    #[arg(long, default_value = "50", value_parser = parse_interval)]
    target_interval: Duration,

    /// Publish a snapshot every N dynamics ticks
    #[arg(long, default_value = "1")]
    snapshot_every: u64,
}

/// Generator interval in seconds; must be finite and positive.
fn parse_interval(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.trim().parse().map_err(|e| format!("{e}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("{s} is not a positive number of seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}

async fn run(args: Args) -> Result<(), SystemError> {
    let params = SimParams::load(&args.params)?;

    let config = SystemConfig {
        params,
        obstacle_interval: args.obstacle_interval,
        target_interval: args.target_interval,
        snapshot_every: args.snapshot_every,
        ..Default::default()
    };

    let ctx = Arc::new(TokioContext::with_seed(args.seed));

    let (snapshot_tx, exporter) = match &args.export {
        Some(path) => {
            let sink = SnapshotExporter::create(path)?;
            let initial = skyboard_core::Blackboard::new(params).snapshot(Duration::ZERO);
            let (tx, rx) = watch::channel::<Snapshot>(initial);
            info!(path = %path, "exporting snapshots");
            (Some(tx), Some(tokio::spawn(run_exporter(rx, sink))))
        }
        None => (None, None),
    };

    let report = run_system(ctx, config, tokio::io::stdin(), snapshot_tx).await?;

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(exit = ?report.coordinator.exit, "coordinator");
    info!(exit = ?report.dynamics, ticks = report.dynamics_ticks, "dynamics");
    info!(exit = ?report.watchdog.exit, warnings = report.watchdog.warnings, "watchdog");
    info!(
        keys = report.keys_forwarded,
        obstacle_batches = report.obstacle_batches,
        target_batches = report.target_batches,
        "producers"
    );
    info!(
        score = report.coordinator.snapshot.score.score,
        collected = report.coordinator.snapshot.score.collected,
        "final score"
    );

    if let Some(handle) = exporter {
        match handle.await {
            Ok(result) => {
                result?;
            }
            Err(e) => error!("exporter task failed: {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
    }

    info!("Skyboard v{}", env!("CARGO_PKG_VERSION"));

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            1
        }
    };

    // A pending stdin read would otherwise hold the runtime open
    std::process::exit(code);
}
