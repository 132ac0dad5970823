//! Relay API client
//!
//! Thin wrapper over the relay's `GET` routes. Responses are decoded into
//! the same types the gateway serves.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use wr_core::config::HttpConfig;

use super::{SendResponse, StatusResponse};

/// Upper bound for one API call. Multi-message sends are paced by the
/// relay, so this is generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Base URL of a relay listening with `http`
pub fn default_base_url(http: &HttpConfig) -> String {
    let host = match http.bind_address.as_str() {
        "" | "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
        other => other,
    };
    format!("http://{}:{}", host, http.port)
}

/// Client for a running relay
pub struct RelayClient {
    base_url: String,
    http: reqwest::Client,
}

impl RelayClient {
    /// Create a client for the relay at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Session status
    pub async fn status(&self) -> Result<StatusResponse> {
        self.get("/status", &[]).await
    }

    /// Send text messages, in order
    pub async fn send(&self, to: &str, messages: &[String]) -> Result<SendResponse> {
        let mut query = vec![("to", to)];
        query.extend(messages.iter().map(|m| ("msg", m.as_str())));
        self.get("/send", &query).await
    }

    /// Send an image by URL
    pub async fn image(&self, to: &str, url: &str, caption: Option<&str>) -> Result<SendResponse> {
        let mut query = vec![("to", to), ("url", url)];
        if let Some(caption) = caption {
            query.push(("caption", caption));
        }
        self.get("/image", &query).await
    }

    /// Send a document by URL
    pub async fn file(&self, to: &str, url: &str, filename: Option<&str>) -> Result<SendResponse> {
        let mut query = vec![("to", to), ("url", url)];
        if let Some(filename) = filename {
            query.push(("filename", filename));
        }
        self.get("/file", &query).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to reach relay at {}. Is it running?", self.base_url))?
            .error_for_status()
            .with_context(|| format!("Relay rejected {}", path))?;

        response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid response from {}", url))
    }
}
