//! Core error types for wa-relay

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use wr_protocol::ProtocolError;

/// Top-level error type for the relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Credential storage error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Message store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the transport capability
#[derive(Error, Debug)]
pub enum TransportError {
    /// No live session to carry the request
    #[error("Transport not connected")]
    NotConnected,

    /// Could not reach the transport
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Request got no answer in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The transport processed the request and reported a failure.
    /// Displays the transport's own message unchanged.
    #[error("{0}")]
    Rejected(String),

    /// The session went away while the request was in flight
    #[error("Transport session closed")]
    SessionClosed,

    /// Wire protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Credential storage errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// File system operation failed
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored credentials are not valid JSON
    #[error("Corrupt credentials file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Message store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// File system operation failed
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Owner file is malformed
    #[error("Invalid owner file {path}: {source}")]
    OwnerFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
