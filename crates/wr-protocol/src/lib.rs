//! wr-protocol: Bridge wire protocol for wa-relay
//!
//! This crate defines the messages exchanged between the relay gateway and
//! the transport sidecar that owns the actual messaging protocol stack.
//! Frames are JSON objects, one per line.

pub mod codec;
pub mod error;
pub mod frame;
pub mod jid;
pub mod message;

pub use codec::{JsonLineCodec, MAX_LINE_LENGTH};
pub use error::ProtocolError;
pub use frame::{BridgeEvent, BridgeRequest, ClientFrame, ResponseBody, ServerFrame};
pub use jid::{digits_only, Jid, USER_SERVER};
pub use message::{
    BlockAction, CallOffer, ConnectOptions, ConnectionPhase, MessageContent, MessageKey,
    UserInfo, WireMessage,
};

/// Bridge protocol version sent in the connect frame
pub const PROTOCOL_VERSION: &str = "1";
