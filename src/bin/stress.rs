// Admission Controller Stress Driver (Standalone)
//
// Hammers one admission controller with concurrent tasks that acquire a
// permit, hold it for a simulated inference call, and release it. Prints
// per-outcome tallies and the final controller status as JSON.
//
// Usage:
//   cargo run --bin stress -- --tasks 64 --hold-ms 250

use anyhow::Result;
use clap::Parser;
use inference_gatekeeper::{Admission, AdmissionController, GatekeeperConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Load generator for the inference admission controller
#[derive(Parser, Debug)]
#[command(name = "stress")]
#[command(about = "Drive concurrent admission attempts against one controller", long_about = None)]
struct Args {
    /// Number of concurrent tasks to spawn
    #[arg(long, default_value_t = 32)]
    tasks: usize,

    /// How long each granted task holds its permit, in milliseconds
    #[arg(long, default_value_t = 200)]
    hold_ms: u64,

    /// Path to a gatekeeper config file (defaults to the XDG location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(serde::Serialize)]
struct StressReport {
    tasks: usize,
    granted: usize,
    bypassed: usize,
    timed_out: usize,
    elapsed_ms: u128,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(filter.into())
                .from_env_lossy(),
        )
        .init();

    let config = match &args.config {
        Some(path) => GatekeeperConfig::load_from_path(path)?,
        None => GatekeeperConfig::load()?,
    };

    let controller = AdmissionController::new(config.admission);
    let granted = Arc::new(AtomicUsize::new(0));
    let bypassed = Arc::new(AtomicUsize::new(0));
    let timed_out = Arc::new(AtomicUsize::new(0));

    info!(
        "Spawning {} tasks, each holding a permit for {}ms",
        args.tasks, args.hold_ms
    );
    let start = Instant::now();

    let mut handles = Vec::with_capacity(args.tasks);
    for _ in 0..args.tasks {
        let controller = controller.clone();
        let granted = Arc::clone(&granted);
        let bypassed = Arc::clone(&bypassed);
        let timed_out = Arc::clone(&timed_out);
        let hold = Duration::from_millis(args.hold_ms);

        handles.push(tokio::spawn(async move {
            match controller.acquire().await {
                Admission::Granted(permit) => {
                    granted.fetch_add(1, Ordering::Relaxed);
                    sleep(hold).await;
                    permit.release();
                }
                Admission::Disabled => {
                    bypassed.fetch_add(1, Ordering::Relaxed);
                    sleep(hold).await;
                }
                Admission::TimedOut => {
                    timed_out.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }

    for handle in handles {
        handle.await?;
    }

    let report = StressReport {
        tasks: args.tasks,
        granted: granted.load(Ordering::Relaxed),
        bypassed: bypassed.load(Ordering::Relaxed),
        timed_out: timed_out.load(Ordering::Relaxed),
        elapsed_ms: start.elapsed().as_millis(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", serde_json::to_string_pretty(&controller.status())?);

    Ok(())
}
