// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use depth_roi::{Config, RoiBand, SensorSource};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "depth-roi")]
#[command(about = "Highlight distance zones in a depth camera stream")]
#[command(version = env!("GIT_VERSION"))]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/depth-roi/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Depth source: synthetic, replay:PATH[@FPS], v4l2[:DEVICE], kinect[:INDEX]
    #[arg(long, global = true)]
    sensor: Option<SensorSource>,

    /// ROI band NAME:MIN_MM:MAX_MM:#RRGGBB (repeatable, replaces configured bands)
    #[arg(long = "roi", global = true)]
    rois: Vec<RoiBand>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Live view in the terminal (default)
    Terminal,

    /// List depth sensors of the selected backend
    List,

    /// Capture frames headlessly and save the last one as PNG
    Snapshot {
        /// Number of frames to process before saving
        #[arg(short, long, default_value = "1")]
        frames: u64,

        /// Output file path (default: ~/Pictures/depth-roi/DEPTH_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The terminal viewer owns the screen, so only errors get through there
    let default_level = match cli.command {
        None | Some(Commands::Terminal) => "error",
        _ => "warn",
    };

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depth_roi=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    let config_path = cli.config.clone().or_else(Config::default_path);

    if let Some(Commands::Config { action }) = cli.command {
        match action {
            ConfigAction::Show => cli::show_config(config_path.as_deref(), cli.sensor, cli.rois)?,
            ConfigAction::Init { force } => cli::init_config(config_path.as_deref(), force)?,
        }
        return Ok(());
    }

    let config = cli::load_config(config_path.as_deref(), cli.sensor, cli.rois.clone())?;

    match cli.command {
        Some(Commands::List) => cli::list_sensors(&config)?,
        Some(Commands::Snapshot { frames, output }) => cli::snapshot(&config, frames, output)?,
        Some(Commands::Terminal) | None => depth_roi::terminal::run(config, config_path, cli.rois)?,
        Some(Commands::Config { .. }) => {}
    }

    Ok(())
}
