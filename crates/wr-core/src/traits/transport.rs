//! Transport capability
//!
//! The transport owns the messaging wire protocol. The relay only starts
//! sessions, consumes their event stream and asks for sends.

use async_trait::async_trait;
use tokio::sync::mpsc;

use wr_protocol::{
    BlockAction, CallOffer, ConnectOptions, Jid, MessageContent, MessageKey, UserInfo,
    WireMessage,
};

use crate::error::TransportError;
use crate::types::{CloseReason, Credentials};

/// Events emitted by a transport session, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The session is open and authenticated as `user`
    Opened { user: UserInfo },
    /// The session closed; no further events follow
    Closed(CloseReason),
    /// QR payload to scan for linking
    Qr(String),
    /// Key material changed and must be persisted
    CredentialsUpdated(Credentials),
    /// Batch of inbound call signals
    Calls(Vec<CallOffer>),
    /// Messages seen on the session
    Messages(Vec<WireMessage>),
}

/// Receiving end of a session's event stream
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Capability to run a messaging session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a new session and return its event stream.
    ///
    /// Asynchronous failures after this returns surface as
    /// [`TransportEvent::Closed`] or as the stream ending.
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: ConnectOptions,
    ) -> Result<EventReceiver, TransportError>;

    /// Send a message, returning the key the transport assigned to it
    async fn send_message(
        &self,
        to: &Jid,
        content: MessageContent,
    ) -> Result<MessageKey, TransportError>;

    /// Ask for a linking code for `phone` (digits only)
    async fn request_pairing_code(&self, phone: &str) -> Result<String, TransportError>;

    /// Block or unblock a contact
    async fn update_block_status(
        &self,
        jid: &Jid,
        action: BlockAction,
    ) -> Result<(), TransportError>;
}
