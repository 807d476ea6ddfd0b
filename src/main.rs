//! cebaf-graph - Main Entry Point
//!
//! Generates per-timestamp accelerator graph snapshots from the inventory
//! and archiver services, or from replay files saved by an earlier run.
//!
//! # Usage
//!
//! ```bash
//! # Fetch, sample and write snapshots under ./out
//! cebaf-graph -c config.yaml -d out
//!
//! # Save the collected data for later replays
//! cebaf-graph -c config.yaml -d out --save-json --json-dir replay
//!
//! # Re-run output generation offline
//! cebaf-graph -c config.yaml -d out2 --read-json --json-dir replay
//! ```

use anyhow::Context;
use cebaf_graph::{pipeline, RunConfig, RunOptions};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name used with `--log-file`
const LOG_FILE_NAME: &str = "cebaf-graph.log";

/// Generate accelerator graph snapshots
#[derive(Parser, Debug)]
#[command(name = "cebaf-graph")]
#[command(author, version)]
#[command(
    about = "Generate labeled accelerator graphs from archived channel data",
    long_about = None
)]
struct Args {
    /// Run configuration (YAML or TOML)
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Root directory for snapshot output
    #[arg(short = 'd', long, default_value = ".")]
    output_dir: PathBuf,

    /// Load nodes and samples from replay files instead of the services
    #[arg(long)]
    read_json: bool,

    /// Save collected nodes and samples as replay files
    #[arg(long)]
    save_json: bool,

    /// Directory of the replay files
    #[arg(long, default_value = ".")]
    json_dir: PathBuf,

    /// Also write logs to cebaf-graph.log in the output directory
    #[arg(long)]
    log_file: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Output directory problems should surface before any network access
    pipeline::check_output_dir(&args.output_dir)?;

    let (file_layer, _guard) = if args.log_file {
        let appender = tracing_appender::rolling::never(&args.output_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cebaf_graph=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting cebaf-graph with {:?}", args.config);

    let config = RunConfig::load(&args.config)
        .with_context(|| format!("Failed to load config {:?}", args.config))?;

    let options = RunOptions {
        output_dir: args.output_dir,
        read_json: args.read_json,
        save_json: args.save_json,
        json_dir: args.json_dir,
    };

    let summary = pipeline::run(&config, &options, None)?;
    tracing::info!("Done: {}", summary);
    Ok(())
}
