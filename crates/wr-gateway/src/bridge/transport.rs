//! Sidecar connection and request correlation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use wr_core::config::BridgeConfig;
use wr_core::error::TransportError;
use wr_core::traits::{EventReceiver, MessageStore, Transport, TransportEvent};
use wr_core::{CloseReason, Credentials};
use wr_protocol::{
    BlockAction, BridgeRequest, ClientFrame, ConnectOptions, Jid, JsonLineCodec, MessageContent,
    MessageKey, ResponseBody, ServerFrame, PROTOCOL_VERSION,
};

use super::events::translate_event;

/// Capacity of the per-session event channel handed to the supervisor
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the outbound frame queue
const WRITER_CHANNEL_CAPACITY: usize = 64;

type BridgeFramed = Framed<TcpStream, JsonLineCodec<ServerFrame, ClientFrame>>;

/// One live sidecar connection
struct Link {
    writer: mpsc::Sender<ClientFrame>,
    /// Requests waiting for their response, by request id
    pending: DashMap<u64, oneshot::Sender<ResponseBody>>,
    /// Cancelled once the connection is gone
    closed: CancellationToken,
}

/// [`Transport`] that drives a sidecar over TCP
pub struct BridgeTransport {
    config: BridgeConfig,
    messages: Arc<dyn MessageStore>,
    link: RwLock<Option<Arc<Link>>>,
    next_id: AtomicU64,
}

impl BridgeTransport {
    /// Create a transport for the sidecar at `config.address`.
    ///
    /// `messages` answers the sidecar's message lookups.
    pub fn new(config: BridgeConfig, messages: Arc<dyn MessageStore>) -> Self {
        Self {
            config,
            messages,
            link: RwLock::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn current(&self) -> Result<Arc<Link>, TransportError> {
        let guard = self.link.read().map_err(|_| TransportError::NotConnected)?;
        match guard.as_ref() {
            Some(link) if !link.closed.is_cancelled() => Ok(Arc::clone(link)),
            _ => Err(TransportError::NotConnected),
        }
    }

    fn replace_link(&self, link: Option<Arc<Link>>) {
        let previous = match self.link.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, link),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), link),
        };
        if let Some(previous) = previous {
            previous.closed.cancel();
        }
    }

    async fn request(&self, request: BridgeRequest) -> Result<ResponseBody, TransportError> {
        let link = self.current()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let op = request.op();

        let (tx, rx) = oneshot::channel();
        link.pending.insert(id, tx);

        // The reader clears `pending` when the link dies; don't wait on a
        // request that was registered after that.
        if link.closed.is_cancelled()
            || link
                .writer
                .send(ClientFrame::Request { id, request })
                .await
                .is_err()
        {
            link.pending.remove(&id);
            return Err(TransportError::SessionClosed);
        }

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(TransportError::SessionClosed),
            Err(_) => {
                link.pending.remove(&id);
                tracing::warn!("Bridge request {} ({}) timed out", id, op);
                Err(TransportError::Timeout(self.config.request_timeout))
            }
        }
    }
}

fn unexpected(op: &str, body: ResponseBody) -> TransportError {
    TransportError::Rejected(format!("Unexpected {} response: {:?}", op, body))
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: ConnectOptions,
    ) -> Result<EventReceiver, TransportError> {
        // A new session supersedes the old one
        self.replace_link(None);

        tracing::debug!("Connecting to sidecar at {}", self.config.address);
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.address),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.config.connect_timeout))?
        .map_err(|e| {
            TransportError::ConnectFailed(format!("{}: {}", self.config.address, e))
        })?;

        let framed = Framed::new(stream, JsonLineCodec::<ServerFrame, ClientFrame>::new());
        let (mut sink, frames) = framed.split();

        sink.send(ClientFrame::Connect {
            version: PROTOCOL_VERSION.to_string(),
            credentials: credentials.map(Credentials::into_value),
            options,
        })
        .await?;

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let link = Arc::new(Link {
            writer: writer_tx,
            pending: DashMap::new(),
            closed: CancellationToken::new(),
        });

        tokio::spawn(write_loop(sink, writer_rx, link.closed.clone()));
        tokio::spawn(read_loop(
            frames,
            Arc::clone(&link),
            event_tx,
            Arc::clone(&self.messages),
        ));

        self.replace_link(Some(link));
        tracing::info!("Sidecar session started at {}", self.config.address);
        Ok(event_rx)
    }

    async fn send_message(
        &self,
        to: &Jid,
        content: MessageContent,
    ) -> Result<MessageKey, TransportError> {
        let request = BridgeRequest::SendMessage {
            jid: to.clone(),
            content,
        };
        match self.request(request).await? {
            ResponseBody::Sent { key } => Ok(key),
            ResponseBody::Error { message } => Err(TransportError::Rejected(message)),
            other => Err(unexpected("send_message", other)),
        }
    }

    async fn request_pairing_code(&self, phone: &str) -> Result<String, TransportError> {
        let request = BridgeRequest::RequestPairingCode {
            phone: phone.to_string(),
        };
        match self.request(request).await? {
            ResponseBody::PairingCode { code } => Ok(code),
            ResponseBody::Error { message } => Err(TransportError::Rejected(message)),
            other => Err(unexpected("request_pairing_code", other)),
        }
    }

    async fn update_block_status(
        &self,
        jid: &Jid,
        action: BlockAction,
    ) -> Result<(), TransportError> {
        let request = BridgeRequest::UpdateBlockStatus {
            jid: jid.clone(),
            action,
        };
        match self.request(request).await? {
            ResponseBody::Done => Ok(()),
            ResponseBody::Error { message } => Err(TransportError::Rejected(message)),
            other => Err(unexpected("update_block_status", other)),
        }
    }
}

async fn write_loop(
    mut sink: SplitSink<BridgeFramed, ClientFrame>,
    mut frames: mpsc::Receiver<ClientFrame>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = closed.cancelled() => break,
        };

        if let Err(e) = sink.send(frame).await {
            tracing::warn!("Failed to write to sidecar: {}", e);
            closed.cancel();
            break;
        }
    }

    let _ = sink.close().await;
}

async fn read_loop(
    mut frames: SplitStream<BridgeFramed>,
    link: Arc<Link>,
    events: mpsc::Sender<TransportEvent>,
    messages: Arc<dyn MessageStore>,
) {
    let mut close_reported = false;

    'read: loop {
        let frame = tokio::select! {
            frame = frames.next() => frame,
            _ = link.closed.cancelled() => break,
        };

        match frame {
            Some(Ok(ServerFrame::Response { id, body })) => match link.pending.remove(&id) {
                Some((_, tx)) => {
                    let _ = tx.send(body);
                }
                None => tracing::debug!("Response for unknown request {}", id),
            },
            Some(Ok(ServerFrame::Event { event })) => {
                for event in translate_event(event) {
                    let is_close = matches!(event, TransportEvent::Closed(_));
                    if events.send(event).await.is_err() {
                        tracing::debug!("Session events no longer consumed");
                        break 'read;
                    }
                    if is_close {
                        close_reported = true;
                        break 'read;
                    }
                }
            }
            Some(Ok(ServerFrame::GetMessage { lookup_id, key })) => {
                let message = messages.load_message(&key);
                tracing::trace!(
                    "Message lookup {} for {}: {}",
                    lookup_id,
                    key.id,
                    if message.is_some() { "hit" } else { "miss" }
                );
                if link
                    .writer
                    .send(ClientFrame::MessageLookup { lookup_id, message })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Some(Err(e)) => {
                tracing::warn!("Sidecar stream error: {}", e);
                break;
            }
            None => {
                tracing::info!("Sidecar closed the connection");
                break;
            }
        }
    }

    link.closed.cancel();
    // Dropping the senders fails every waiting request
    link.pending.clear();

    if !close_reported {
        let _ = events.send(TransportEvent::Closed(CloseReason::default())).await;
    }
}
