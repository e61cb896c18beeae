//! Track Synchronization Simulator (tsync-sim) - Main entry point
//!
//! Runs a video and an audio track on simulated devices under a toy
//! scheduler and prints every report the tracks send back.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tsync_common::config::{ConfigResolver, RecoveryMode};
use tsync_common::events::ReportRecord;
use tsync_tracks::sim::scenario::{self, ScenarioOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Command-line arguments for tsync-sim
#[derive(Parser, Debug)]
#[command(name = "tsync-sim")]
#[command(about = "Simulate track synchronization against a toy scheduler")]
#[command(version)]
struct Args {
    /// Config file (overrides TSYNC_CONFIG and the user config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated run time in milliseconds
    #[arg(long, default_value = "10000")]
    run_ms: f64,

    /// Scheduler tick in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: f64,

    /// Video duration in seconds
    #[arg(long, default_value = "30")]
    video_secs: f64,

    /// Audio clip duration in seconds
    #[arg(long, default_value = "30")]
    audio_secs: f64,

    /// Simulated time until the audio clip has loaded (ms)
    #[arg(long, default_value = "200")]
    audio_load_ms: f64,

    /// Start of a video buffering stall (ms)
    #[arg(long, requires = "stall_ms")]
    stall_at: Option<f64>,

    /// Length of the video buffering stall (ms)
    #[arg(long, requires = "stall_at")]
    stall_ms: Option<f64>,

    /// Freeze the video device at this time (ms)
    #[arg(long)]
    break_video_at: Option<f64>,

    /// Reload frozen video devices regardless of the config file
    #[arg(long)]
    reload_on_stalled_seek: bool,

    /// Event output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if args.reload_on_stalled_seek {
        config.recovery.mode = RecoveryMode::ReloadOnStalledSeek;
    }

    // RUST_LOG wins over the config file
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("tsync_tracks={0},tsync_common={0}", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = ScenarioOptions {
        run_ms: args.run_ms,
        tick_ms: args.tick_ms,
        video_secs: args.video_secs,
        audio_secs: args.audio_secs,
        audio_load_ms: args.audio_load_ms,
        stall: args.stall_at.zip(args.stall_ms),
        break_video_at: args.break_video_at,
    };
    anyhow::ensure!(options.tick_ms > 0.0, "--tick-ms must be positive");

    info!(
        "Starting simulation: {}ms at {}ms ticks, recovery {:?}",
        options.run_ms, options.tick_ms, config.recovery.mode
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let local = LocalSet::new();

    let format = args.format;
    let mut print_error = None;
    let summary = local.block_on(&runtime, async {
        scenario::run(&options, &config, |record| {
            if print_error.is_none() {
                if let Err(e) = print_record(record, format) {
                    print_error = Some(e);
                }
            }
        })
        .await
    });
    if let Some(e) = print_error {
        return Err(e);
    }

    info!(
        "Simulation complete: {} ticks ({} stuck), progress {:.0}ms, video at {:.0}ms, {} video reloads, {} events",
        summary.ticks,
        summary.stuck_ticks,
        summary.final_progress_ms,
        summary.video_position_ms,
        summary.video_reloads,
        summary.events
    );
    Ok(())
}

fn print_record(record: &ReportRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{} {}", record.at.format("%H:%M:%S%.3f"), record.event);
        }
        OutputFormat::Json => {
            let line = serde_json::to_string(record).context("Failed to encode event")?;
            println!("{}", line);
        }
    }
    Ok(())
}
