//! Transport backed by a protocol sidecar
//!
//! The messaging protocol stack runs in a separate process. The gateway
//! talks to it over TCP with newline-delimited JSON frames: one connection
//! per session, correlated requests, pushed events, and message lookups the
//! sidecar needs to retry deliveries.

mod events;
mod transport;

pub use events::translate_event;
pub use transport::BridgeTransport;
