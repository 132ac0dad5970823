//! wa-relay: Command-line interface for the relay
//!
//! Provides the `wa-relay` binary: `serve` runs the gateway in the
//! foreground, the other commands talk to a running relay over its HTTP API.

pub mod api;
pub mod commands;
pub mod output;
