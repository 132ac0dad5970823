//! Message payloads and session descriptors shared with the sidecar

use serde::{Deserialize, Serialize};

use crate::jid::Jid;

/// Outbound message content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text { text: String },

    /// Image fetched by the transport from a URL
    Image { url: String, caption: String },

    /// Document fetched by the transport from a URL
    Document {
        url: String,
        mimetype: String,
        file_name: String,
    },
}

impl MessageContent {
    /// Plain text message
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Image { .. } => "image",
            Self::Document { .. } => "document",
        }
    }
}

/// Key assigned by the transport to a sent or received message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageKey {
    /// Conversation the message belongs to
    pub remote_jid: Jid,
    /// Transport-assigned message id
    pub id: String,
    /// Whether this session authored the message
    #[serde(default)]
    pub from_me: bool,
}

/// A message as seen on the event stream, kept for retry lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub key: MessageKey,
    /// Opaque protocol message body
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Identity of the logged-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Jid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Inbound call signal. Depending on the call type the caller may be
/// reported in any of the three address fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOffer {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub from: Option<Jid>,
    #[serde(default)]
    pub peer_jid: Option<Jid>,
    #[serde(default)]
    pub chat_id: Option<Jid>,
    #[serde(default)]
    pub status: Option<String>,
}

impl CallOffer {
    /// The calling party, if the signal carries one
    pub fn caller(&self) -> Option<&Jid> {
        self.from
            .as_ref()
            .or(self.peer_jid.as_ref())
            .or(self.chat_id.as_ref())
    }
}

/// Block list action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockAction {
    Block,
    Unblock,
}

/// Connection phase reported by a `connection_update` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Connecting,
    Open,
    Close,
}

/// Session options forwarded to the transport on connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Browser identity triple shown in the linked-devices list
    pub browser: [String; 3],
    /// Announce presence as online once connected
    pub mark_online_on_connect: bool,
    /// Request full history sync on link
    pub sync_full_history: bool,
    /// Let the transport emit QR payloads for scanning
    pub emit_qr: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            browser: [
                "CodioAPI".to_string(),
                "Chrome".to_string(),
                "1.0".to_string(),
            ],
            mark_online_on_connect: true,
            sync_full_history: true,
            emit_qr: true,
        }
    }
}
