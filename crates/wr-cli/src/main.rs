//! wa-relay CLI
//!
//! Single binary for the relay:
//! - `serve` runs the gateway (session supervisor and HTTP API)
//! - `status`, `send`, `image` and `file` talk to a running relay
//! - `config` manages the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wa_relay::api::{default_base_url, RelayClient};
use wa_relay::commands::{self, ServeOverrides};

#[derive(Parser)]
#[command(name = "wa-relay")]
#[command(author, version, about = "HTTP relay for a WhatsApp session")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "WA_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Relay API URL (defaults to the configured HTTP listener)
    #[arg(long, global = true, env = "WA_RELAY_URL")]
    url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay in the foreground
    /// Alias: start
    #[command(alias = "start")]
    Serve {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
        /// HTTP port (overrides config)
        #[arg(short, long, env = "API_PORT")]
        port: Option<u16>,
        /// Link with a pairing code instead of a QR code
        #[arg(long)]
        pairing_code: bool,
        /// Phone number to pair, international format (implies --pairing-code)
        #[arg(long, env = "PHONE_NUMBER")]
        phone_number: Option<String>,
        /// Use the mobile registration API
        #[arg(long)]
        mobile: bool,
    },

    /// Show the relay session status
    Status {
        /// Print the raw JSON answer
        #[arg(long)]
        json: bool,
    },

    /// Send text messages, in order
    Send {
        /// Recipient phone number
        to: String,
        /// Message text(s)
        #[arg(required = true)]
        messages: Vec<String>,
    },

    /// Send an image by URL
    Image {
        /// Recipient phone number
        to: String,
        /// Image URL
        url: String,
        /// Caption
        #[arg(long)]
        caption: Option<String>,
    },

    /// Send a file by URL
    File {
        /// Recipient phone number
        to: String,
        /// File URL
        url: String,
        /// File name shown to the recipient
        #[arg(long)]
        filename: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get specific config value
    Get { key: String },
    /// Set config value
    Set { key: String, value: String },
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The daemon logs at info by default, client commands stay quiet
    let serving = matches!(cli.command, Some(Commands::Serve { .. }));
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) if serving => "info",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let command = cli.command.unwrap_or(Commands::Status { json: false });

    match command {
        Commands::Serve {
            bind,
            port,
            pairing_code,
            phone_number,
            mobile,
        } => {
            let overrides = ServeOverrides {
                bind,
                port,
                pairing_code,
                phone_number,
                mobile,
            };
            commands::serve_command(cli.config.as_ref(), overrides).await?;
        }

        Commands::Status { json } => {
            let client = client(cli.url, cli.config.as_ref())?;
            commands::status_command(&client, json).await?;
        }

        Commands::Send { to, messages } => {
            let client = client(cli.url, cli.config.as_ref())?;
            commands::send_command(&client, &to, &messages).await?;
        }

        Commands::Image { to, url, caption } => {
            let client = client(cli.url, cli.config.as_ref())?;
            commands::image_command(&client, &to, &url, caption.as_deref()).await?;
        }

        Commands::File { to, url, filename } => {
            let client = client(cli.url, cli.config.as_ref())?;
            commands::file_command(&client, &to, &url, filename.as_deref()).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(cli.config.as_ref())?,
            ConfigAction::Get { key } => commands::config_get(cli.config.as_ref(), &key)?,
            ConfigAction::Set { key, value } => {
                commands::config_set(cli.config.as_ref(), &key, &value)?
            }
            ConfigAction::Init { force } => commands::config_init(cli.config.as_ref(), force)?,
            ConfigAction::Path => {
                let path = cli
                    .config
                    .unwrap_or_else(wr_core::config::default_config_path);
                println!("{}", path.display());
            }
        },
    }

    Ok(())
}

/// API client for `--url`, or for the configured HTTP listener
fn client(url: Option<String>, config_path: Option<&PathBuf>) -> Result<RelayClient> {
    let base_url = match url {
        Some(url) => url,
        None => default_base_url(&commands::load_relay_config(config_path)?.http),
    };
    RelayClient::new(base_url)
}
