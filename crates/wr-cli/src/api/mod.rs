//! HTTP API client for a running relay

mod client;

pub use client::{default_base_url, RelayClient};
pub use wr_gateway::server::{SendResponse, StatusResponse};
