//! Relay configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use wr_protocol::ConnectOptions;

use super::serde_utils::{duration_millis, duration_secs};

/// Default rejection notice sent to callers
pub const DEFAULT_CALL_NOTICE: &str = "📵 Anticall is enabled. Your call was rejected.";

/// Configuration for the relay daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// JSON array of owner numbers, read once at startup
    pub owner_file: PathBuf,

    /// HTTP API listener
    pub http: HttpConfig,

    /// Messaging session options
    pub session: SessionConfig,

    /// Pairing code linking
    pub pairing: PairingConfig,

    /// Reconnect policy
    pub backoff: BackoffConfig,

    /// Incoming call rejection
    pub caller_guard: CallerGuardConfig,

    /// Outbound dispatch
    pub dispatch: DispatchConfig,

    /// Message history store
    pub store: StoreConfig,

    /// Transport sidecar connection
    pub bridge: BridgeConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            owner_file: PathBuf::from("./data/owner.json"),
            http: HttpConfig::default(),
            session: SessionConfig::default(),
            pairing: PairingConfig::default(),
            backoff: BackoffConfig::default(),
            caller_guard: CallerGuardConfig::default(),
            dispatch: DispatchConfig::default(),
            store: StoreConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Interface to bind
    pub bind_address: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl HttpConfig {
    /// `address:port` string for binding
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Messaging session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the session credentials (removed on logout)
    pub credentials_dir: PathBuf,

    /// Display name used in the connection confirmation message
    pub bot_name: String,

    /// Browser identity triple shown in the linked-devices list
    pub browser: [String; 3],

    /// Announce presence as online once connected
    pub mark_online_on_connect: bool,

    /// Request full history sync on link
    pub sync_full_history: bool,

    /// Send a confirmation message to the own account when the session opens
    pub send_confirmation: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let options = ConnectOptions::default();
        Self {
            credentials_dir: PathBuf::from("./session"),
            bot_name: "Codio API Bot".to_string(),
            browser: options.browser,
            mark_online_on_connect: options.mark_online_on_connect,
            sync_full_history: options.sync_full_history,
            send_confirmation: true,
        }
    }
}

impl SessionConfig {
    /// Connect options for the transport
    pub fn connect_options(&self, emit_qr: bool) -> ConnectOptions {
        ConnectOptions {
            browser: self.browser.clone(),
            mark_online_on_connect: self.mark_online_on_connect,
            sync_full_history: self.sync_full_history,
            emit_qr,
        }
    }
}

/// Pairing code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Link with a pairing code instead of a QR code
    pub enabled: bool,

    /// Mobile registration mode (cannot be combined with pairing codes)
    pub mobile: bool,

    /// Number to pair; prompted for on a TTY when absent.
    /// Setting it selects pairing mode.
    pub phone_number: Option<String>,

    /// Fallback number when no TTY is available to prompt
    pub owner_number: Option<String>,

    /// Delay before requesting the code, letting the transport finish its handshake
    #[serde(with = "duration_millis")]
    pub code_delay: Duration,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mobile: false,
            phone_number: None,
            owner_number: None,
            code_delay: Duration::from_millis(3000),
        }
    }
}

impl PairingConfig {
    /// Whether pairing-code linking is selected
    pub fn is_selected(&self) -> bool {
        self.enabled || self.phone_number.is_some()
    }
}

/// Exponential backoff and circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,

    /// Consecutive attempts without reaching Open before the circuit opens
    pub max_attempts: u32,

    /// How long the circuit stays open before attempts resume
    #[serde(with = "duration_secs")]
    pub circuit_cooldown: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
            max_attempts: 10,
            circuit_cooldown: Duration::from_secs(300),
        }
    }
}

/// Incoming call rejection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerGuardConfig {
    /// Reject and block incoming calls
    pub enabled: bool,

    /// Window during which a caller gets at most one notice
    #[serde(with = "duration_secs")]
    pub debounce_window: Duration,

    /// Delay between a call signal and blocking the caller
    #[serde(with = "duration_millis")]
    pub block_delay: Duration,

    /// How often expired callers are swept
    #[serde(with = "duration_secs")]
    pub sweep_interval: Duration,

    /// Text sent to rejected callers
    pub notice: String,
}

impl Default for CallerGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_window: Duration::from_secs(60),
            block_delay: Duration::from_millis(800),
            sweep_interval: Duration::from_secs(10),
            notice: DEFAULT_CALL_NOTICE.to_string(),
        }
    }
}

/// Outbound dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Minimum gap between consecutive sends of one request
    #[serde(with = "duration_millis")]
    pub inter_message_delay: Duration,

    /// Run requests one at a time instead of letting them interleave
    pub serialize_requests: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            inter_message_delay: Duration::from_millis(400),
            serialize_requests: false,
        }
    }
}

/// Message history configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// History file
    pub path: PathBuf,

    /// Flush interval
    #[serde(with = "duration_millis")]
    pub write_interval: Duration,

    /// Messages kept per conversation
    pub max_messages_per_chat: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/store.json"),
            write_interval: Duration::from_millis(10_000),
            max_messages_per_chat: 50,
        }
    }
}

/// Transport sidecar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Sidecar address
    pub address: String,

    /// Connection timeout
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Per-request timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3010".to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
        }
    }
}
