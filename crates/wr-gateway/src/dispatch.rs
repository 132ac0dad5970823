//! Outbound dispatch gated on the session state

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use wr_core::config::DispatchConfig;
use wr_core::error::TransportError;
use wr_core::traits::Transport;
use wr_core::SessionHandle;
use wr_protocol::{Jid, MessageContent};

/// Mimetype used for documents sent by URL
pub const DOCUMENT_MIMETYPE: &str = "application/octet-stream";

/// File name used when the caller gives none
pub const DEFAULT_FILE_NAME: &str = "file";

/// Dispatch failures
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The session was not open when the request arrived
    #[error("WhatsApp not connected")]
    NotConnected,

    /// A send failed. `sent` holds the ids of items delivered before it.
    #[error("{source}")]
    Send {
        sent: Vec<String>,
        #[source]
        source: TransportError,
    },
}

impl DispatchError {
    /// Ids of the messages that went out before the failure
    pub fn sent_ids(&self) -> &[String] {
        match self {
            Self::NotConnected => &[],
            Self::Send { sent, .. } => sent,
        }
    }
}

/// Sends messages on behalf of API callers
pub struct DispatchGateway {
    transport: Arc<dyn Transport>,
    session: SessionHandle,
    inter_message_delay: Duration,
    /// Held for a whole request when requests must not interleave. Holds the
    /// time of the last send so spacing also applies across requests.
    serial: Option<Mutex<Option<Instant>>>,
}

impl DispatchGateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionHandle,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            transport,
            session,
            inter_message_delay: config.inter_message_delay,
            serial: config.serialize_requests.then(|| Mutex::new(None)),
        }
    }

    /// Whether the session is open right now
    pub fn is_connected(&self) -> bool {
        self.session.is_open()
    }

    /// Send text items to `to` one after another, in order.
    ///
    /// Consecutive sends are at least `inter_message_delay` apart. The
    /// session is re-checked before every item; the first failure ends the
    /// request and the error carries the ids sent so far.
    pub async fn send_text(
        &self,
        to: &Jid,
        messages: &[String],
    ) -> Result<Vec<String>, DispatchError> {
        if !self.is_connected() {
            return Err(DispatchError::NotConnected);
        }
        let mut serial = self.lock().await;

        let mut ids = Vec::with_capacity(messages.len());
        for (i, text) in messages.iter().enumerate() {
            self.pace(serial.as_deref_mut(), i > 0).await;
            let result = self.send_one(to, MessageContent::text(text.as_str())).await;
            record_send(serial.as_deref_mut());

            match result {
                Ok(id) => ids.push(id),
                Err(source) => {
                    tracing::warn!(
                        "Send to {} stopped after {}/{} messages: {}",
                        to,
                        ids.len(),
                        messages.len(),
                        source
                    );
                    return Err(DispatchError::Send { sent: ids, source });
                }
            }
        }

        tracing::info!("Sent {} messages to {}", ids.len(), to);
        Ok(ids)
    }

    /// Send an image fetched from `url`
    pub async fn send_image(
        &self,
        to: &Jid,
        url: &str,
        caption: &str,
    ) -> Result<String, DispatchError> {
        self.send_single(
            to,
            MessageContent::Image {
                url: url.to_string(),
                caption: caption.to_string(),
            },
        )
        .await
    }

    /// Send a document fetched from `url`
    pub async fn send_file(
        &self,
        to: &Jid,
        url: &str,
        file_name: &str,
    ) -> Result<String, DispatchError> {
        self.send_single(
            to,
            MessageContent::Document {
                url: url.to_string(),
                mimetype: DOCUMENT_MIMETYPE.to_string(),
                file_name: file_name.to_string(),
            },
        )
        .await
    }

    async fn send_single(
        &self,
        to: &Jid,
        content: MessageContent,
    ) -> Result<String, DispatchError> {
        if !self.is_connected() {
            return Err(DispatchError::NotConnected);
        }
        let mut serial = self.lock().await;

        let kind = content.kind();
        self.pace(serial.as_deref_mut(), false).await;
        let result = self.send_one(to, content).await;
        record_send(serial.as_deref_mut());

        let id = result.map_err(|source| DispatchError::Send {
            sent: Vec::new(),
            source,
        })?;
        tracing::info!("Sent {} {} to {}", kind, id, to);
        Ok(id)
    }

    /// One transport send, refused unless the session is open at this instant
    async fn send_one(&self, to: &Jid, content: MessageContent) -> Result<String, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let key = self.transport.send_message(to, content).await?;
        Ok(key.id)
    }

    async fn lock(&self) -> Option<MutexGuard<'_, Option<Instant>>> {
        match &self.serial {
            Some(mutex) => Some(mutex.lock().await),
            None => None,
        }
    }

    /// Wait out the gap before the next send. Serialized requests are spaced
    /// from the last send of any request, others only within the request.
    async fn pace(&self, last_send: Option<&mut Option<Instant>>, follows_send: bool) {
        match last_send {
            Some(Some(last)) => tokio::time::sleep_until(*last + self.inter_message_delay).await,
            Some(None) => {}
            None if follows_send => tokio::time::sleep(self.inter_message_delay).await,
            None => {}
        }
    }
}

fn record_send(last_send: Option<&mut Option<Instant>>) {
    if let Some(last) = last_send {
        *last = Some(Instant::now());
    }
}
