//! Valve Communication Service (`valvesrv`)
//!
//! Headless runner: loads configuration and the persisted device list,
//! optionally connects to the configured serial port, and keeps polling
//! until interrupted.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use valvesrv::utils::init_logger;
use valvesrv::{AppConfig, BusManager, JsonDeviceStore};

#[derive(Parser, Debug)]
#[command(name = "valvesrv", about = "Half-duplex field bus communication service")]
struct Args {
    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overrides the configured one
    #[arg(long)]
    port: Option<String>,

    /// Baud rate, overrides the configured one
    #[arg(long)]
    baud: Option<u32>,

    /// Log level, overrides the configured one
    #[arg(long)]
    log_level: Option<String>,

    /// Force console logging even when file logging is configured
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.service.log_level);
    init_logger(
        &config.service.log_dir,
        &config.service.name,
        level,
        args.console || config.service.console,
    )
    .context("Failed to initialize logging")?;

    let store = JsonDeviceStore::new(&config.devices.file);
    let manager = BusManager::with_store(config.clone(), Box::new(store))
        .context("Failed to load device list")?;
    info!(
        "Loaded {} device(s) from {}",
        manager.device_count(),
        config.devices.file
    );

    let port = args
        .port
        .or_else(|| (!config.serial.port.is_empty()).then(|| config.serial.port.clone()));
    let baud = args.baud.unwrap_or(config.serial.baud_rate);

    match port {
        Some(port) => {
            manager
                .connect(&port, baud)
                .await
                .with_context(|| format!("Failed to connect to {port} @ {baud}"))?;
            info!("Polling on {port} @ {baud}");
        }
        None => warn!("No serial port configured; staying idle (use --port)"),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    manager.disconnect().await;
    Ok(())
}
