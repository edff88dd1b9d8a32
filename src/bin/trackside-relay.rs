//! Trackside telemetry relay service
//!
//! Reads GYK frames from the serial port and broadcasts downstream packets to
//! TCP clients until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use trackside_relay::{BroadcastServer, DetectionFlags, RelayConfig, RelayLoop, sources};

#[derive(Parser, Debug)]
#[command(author, version, about = "GYK telemetry relay with TCP broadcast", long_about = None)]
struct Args {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the TCP listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the serial port name
    #[arg(long)]
    serial: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if let Some(port) = args.port {
        config.tcp_port = port;
    }
    if let Some(serial) = args.serial {
        config.serial.port_name = serial;
    }
    config.validate().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid logging.level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        tcp_port = config.tcp_port,
        serial = %config.serial.port_name,
        interval_ms = config.check_interval_ms,
        "Starting trackside relay"
    );

    let server = BroadcastServer::start(config.listen_addr())
        .await
        .context("starting broadcast server")?;
    let source = sources::open_serial_or_disconnected(&config.serial);

    // Shared with the vision subsystem, which raises flags on detections.
    let flags = Arc::new(DetectionFlags::new());

    let handle = RelayLoop::new(config, source, flags, server).spawn();

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutdown requested");
    handle.shutdown().await;

    Ok(())
}
