//! Bridge frames
//!
//! The gateway sends [`ClientFrame`]s to the sidecar and receives
//! [`ServerFrame`]s back. Requests carry a numeric id that the sidecar echoes
//! in its response; events are pushed unsolicited.

use serde::{Deserialize, Serialize};

use crate::jid::Jid;
use crate::message::{
    BlockAction, CallOffer, ConnectOptions, ConnectionPhase, MessageContent, MessageKey,
    UserInfo, WireMessage,
};

/// Frame sent from the gateway to the sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Open a new protocol session (first frame on every connection)
    Connect {
        version: String,
        /// Stored credentials, absent on first run
        credentials: Option<serde_json::Value>,
        options: ConnectOptions,
    },

    /// Correlated request
    Request { id: u64, request: BridgeRequest },

    /// Answer to a [`ServerFrame::GetMessage`] lookup
    MessageLookup {
        lookup_id: u64,
        message: Option<serde_json::Value>,
    },
}

/// Operations the gateway can ask the sidecar to perform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    SendMessage { jid: Jid, content: MessageContent },
    RequestPairingCode { phone: String },
    UpdateBlockStatus { jid: Jid, action: BlockAction },
}

impl BridgeRequest {
    /// Operation name used in logs
    pub fn op(&self) -> &'static str {
        match self {
            Self::SendMessage { .. } => "send_message",
            Self::RequestPairingCode { .. } => "request_pairing_code",
            Self::UpdateBlockStatus { .. } => "update_block_status",
        }
    }
}

/// Frame sent from the sidecar to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Result of a [`ClientFrame::Request`]
    Response { id: u64, body: ResponseBody },

    /// Unsolicited session event
    Event { event: BridgeEvent },

    /// The protocol stack needs a previously seen message to retry a send
    GetMessage { lookup_id: u64, key: MessageKey },
}

/// Outcome of a bridge request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseBody {
    Sent { key: MessageKey },
    PairingCode { code: String },
    Done,
    Error { message: String },
}

/// Session events pushed by the sidecar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    ConnectionUpdate {
        #[serde(default)]
        connection: Option<ConnectionPhase>,
        /// Status code of the error that closed the connection
        #[serde(default)]
        status_code: Option<u16>,
        /// Set when the account explicitly logged this device out
        #[serde(default)]
        logged_out: bool,
        #[serde(default)]
        qr: Option<String>,
        #[serde(default)]
        user: Option<UserInfo>,
    },

    CredsUpdate { creds: serde_json::Value },

    Call { calls: Vec<CallOffer> },

    MessagesUpsert { messages: Vec<WireMessage> },
}
