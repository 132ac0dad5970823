//! wa-relay gateway daemon
//!
//! Keeps the messaging session alive and serves the HTTP API.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wr_core::config::{self, RelayConfig};

#[derive(Parser)]
#[command(name = "wr-gateway")]
#[command(about = "wa-relay gateway daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "WA_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    /// HTTP port (overrides config)
    #[arg(short, long, env = "API_PORT")]
    port: Option<u16>,

    /// Link with a pairing code instead of a QR code
    #[arg(long)]
    pairing_code: bool,

    /// Phone number to pair (implies --pairing-code)
    #[arg(long, env = "PHONE_NUMBER")]
    phone_number: Option<String>,

    /// Use the mobile registration API
    #[arg(long)]
    mobile: bool,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("wa-relay gateway starting...");

    let mut config: RelayConfig = if let Some(config_path) = &args.config {
        config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        let default_path = config::default_config_path();
        if default_path.exists() {
            config::load_config(&default_path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
                RelayConfig::default()
            })
        } else {
            tracing::info!("Using default configuration");
            RelayConfig::default()
        }
    };

    if let Some(bind) = args.bind {
        config.http.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if args.pairing_code {
        config.pairing.enabled = true;
    }
    if args.phone_number.is_some() {
        config.pairing.phone_number = args.phone_number;
    }
    if args.mobile {
        config.pairing.mobile = true;
    }

    let cancel = CancellationToken::new();

    wr_gateway::shutdown_on_signal(cancel.clone());

    wr_gateway::run(config, cancel).await
}
