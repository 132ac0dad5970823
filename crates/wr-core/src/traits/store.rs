//! Storage traits

use async_trait::async_trait;

use wr_protocol::{MessageKey, WireMessage};

use crate::error::CredentialError;
use crate::types::Credentials;

/// Durable session key material
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load stored credentials, `None` when nothing is stored yet
    async fn load(&self) -> Result<Option<Credentials>, CredentialError>;

    /// Persist updated credentials
    async fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError>;

    /// Irreversibly delete everything stored
    async fn wipe(&self) -> Result<(), CredentialError>;
}

/// Message history used to answer transport retry lookups
pub trait MessageStore: Send + Sync {
    /// Look up a stored message body by conversation and id
    fn load_message(&self, key: &MessageKey) -> Option<serde_json::Value>;

    /// Record messages seen on the event stream
    fn record(&self, messages: &[WireMessage]);
}
