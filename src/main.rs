// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use relaycam::{BitratePreset, Config};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "relaycam")]
#[command(about = "Relay a camera or stream to a virtual camera, record it and scan QR codes")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalOptions {
    /// Capture and virtual camera frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Do not create a virtual camera
    #[arg(long, global = true)]
    no_virtual_camera: bool,

    /// Write to a v4l2loopback device instead of a PipeWire node
    #[arg(long, global = true, value_name = "PATH")]
    virtual_device: Option<PathBuf>,

    /// Disable QR code scanning
    #[arg(long, global = true)]
    no_qr: bool,

    /// Recording quality (low, medium, high)
    #[arg(long, global = true)]
    bitrate: Option<BitratePreset>,
}

impl GlobalOptions {
    /// Defaults overlaid with the flags that were given
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(fps) = self.fps {
            config.target_fps = fps.clamp(1, 120);
        }
        if self.no_virtual_camera {
            config.virtual_camera_enabled = false;
        }
        if let Some(device) = &self.virtual_device {
            config.virtual_device = Some(device.clone());
        }
        if self.no_qr {
            config.qr_scan_enabled = false;
        }
        if let Some(preset) = self.bitrate {
            config.bitrate_preset = preset;
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run in terminal mode (renders the stream to the terminal)
    Terminal {
        /// Camera index (from 'relaycam list') or stream URL
        #[arg(short, long, default_value = "")]
        source: String,
    },

    /// List cameras and audio inputs
    List,

    /// Relay a source to the virtual camera until Ctrl+C
    Stream {
        /// Camera index (from 'relaycam list') or stream URL
        #[arg(short, long, default_value = "")]
        source: String,
    },

    /// Record video with microphone audio
    Record {
        /// Camera index (from 'relaycam list') or stream URL
        #[arg(short, long, default_value = "")]
        source: String,

        /// Stop after this many seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Take a photo
    Photo {
        /// Camera index (from 'relaycam list') or stream URL
        #[arg(short, long, default_value = "")]
        source: String,

        /// Output file path (default: ~/Pictures/relaycam/IMG_TIMESTAMP.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=relaycam=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli.options.config();

    match cli.command {
        Some(Commands::Terminal { source }) => relaycam::terminal::run(config, &source),
        None => relaycam::terminal::run(config, ""),
        Some(Commands::List) => cli::list_devices(&config),
        Some(Commands::Stream { source }) => cli::stream(config, &source),
        Some(Commands::Record { source, duration }) => cli::record(config, &source, duration),
        Some(Commands::Photo { source, output }) => cli::take_photo(config, &source, output),
        Some(Commands::Config) => cli::print_config(&config),
    }
}
