//! Audite player (audite-play) - command-line entry point
//!
//! Plays one audio file through the real-time bridge and reports position
//! and signal level until the stream ends or Ctrl+C is pressed.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use audite_common::config::{ConfigResolver, TomlConfig};
use audite_player::{BridgeConfig, PlaybackBridge, StreamDecoder};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Log level used until the config file has been read
const DEFAULT_LOG_LEVEL: &str = "info";

/// Command-line arguments for audite-play
#[derive(Parser, Debug)]
#[command(name = "audite-play")]
#[command(about = "Real-time audio player with a live level meter")]
#[command(version)]
struct Args {
    /// Audio file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output device name (default device if omitted)
    #[arg(short, long)]
    device: Option<String>,

    /// Fixed hardware buffer size in frames
    #[arg(long)]
    frames_per_buffer: Option<u32>,

    /// Start position in seconds
    #[arg(short, long)]
    seek: Option<f64>,

    /// Interval between level reports in milliseconds
    #[arg(long)]
    meter_interval_ms: Option<u64>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env().ok();
    let filter_from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| log_filter(DEFAULT_LOG_LEVEL)));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = ConfigResolver::new().resolve(args.config.as_deref());
    let mut config = TomlConfig::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    if !filter_from_env {
        if let Err(e) = filter_handle.reload(log_filter(&config.logging.level)) {
            warn!("Failed to apply log level '{}': {}", config.logging.level, e);
        }
    }

    info!(
        "audite-play {} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    if args.list_devices {
        for name in PlaybackBridge::list_devices().context("Failed to enumerate devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    // Command-line arguments override the config file
    if let Some(device) = args.device {
        config.output.device = Some(device);
    }
    if let Some(frames) = args.frames_per_buffer {
        config.output.frames_per_buffer = frames;
    }
    if let Some(interval) = args.meter_interval_ms {
        config.output.meter_interval_ms = interval;
    }
    config.validate().context("Invalid configuration")?;

    let file = args.file.context("No input file given")?;
    let mut decoder = StreamDecoder::open(&file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let format = decoder.format();
    info!(
        "Playing {} ({}, {:?} frames)",
        file.display(),
        format,
        decoder.length()
    );

    if let Some(seconds) = args.seek {
        let frame = decoder
            .frame_for_time(seconds)
            .and_then(|frame| decoder.seek_frame(frame))
            .context("Invalid seek position")?;
        info!("Starting at frame {}", frame);
    }

    let decoder = decoder.into_shared();
    let mut bridge = PlaybackBridge::open(BridgeConfig::from(&config.output))
        .context("Failed to open audio output")?;

    bridge
        .start(decoder.clone())
        .context("Failed to start playback")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(config.output.meter_interval_ms));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let seconds = bridge.position() as f64 * format.seconds_per_frame();
                println!("{:>9.2}s {}", seconds, meter_bar(bridge.current_level(), 40));

                if bridge.reached_end() {
                    info!("End of stream");
                    break;
                }
                if bridge.has_error() {
                    warn!("Output device reported an error, stopping");
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    bridge.stop().context("Failed to stop playback")?;
    bridge.close().context("Failed to close audio output")?;

    if let Ok(mut decoder) = decoder.lock() {
        decoder.close();
    }

    Ok(())
}

/// Same level for the player and the shared config crate
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!("audite_player={level},audite_common={level}"))
}

/// Render an RMS level as a fixed-width text meter
fn meter_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("[{}{}] {:.3}", "#".repeat(filled), " ".repeat(width - filled), level)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
