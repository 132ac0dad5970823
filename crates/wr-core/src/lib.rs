//! wr-core: Core abstractions and configuration for wa-relay
//!
//! This crate provides the shared types, collaborator traits, configuration
//! structures and on-disk stores used by the gateway and the CLI.

pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod owner;
pub mod session;
pub mod traits;
pub mod types;

pub use error::RelayError;
pub use session::{session_channel, SessionHandle, SessionPublisher, SessionStatus};
pub use types::{CloseReason, ConnectionState, Credentials, DisconnectReason};
