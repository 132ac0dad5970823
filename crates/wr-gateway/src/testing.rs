//! In-memory collaborators for unit tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use wr_core::error::{CredentialError, TransportError};
use wr_core::traits::{CredentialStore, EventReceiver, Transport, TransportEvent};
use wr_core::Credentials;
use wr_protocol::{BlockAction, ConnectOptions, Jid, MessageContent, MessageKey};

/// A message handed to the mock transport
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub to: Jid,
    pub content: MessageContent,
    pub at: Instant,
}

/// A block list update handed to the mock transport
#[derive(Debug, Clone)]
pub struct BlockUpdate {
    pub jid: Jid,
    pub action: BlockAction,
    pub at: Instant,
}

/// Scriptable transport. Every `connect` opens a fresh event channel the test
/// drives with [`MockTransport::emit`].
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentMessage>>,
    blocks: Mutex<Vec<BlockUpdate>>,
    pairing_requests: Mutex<Vec<String>>,
    connects: Mutex<Vec<(Option<Credentials>, ConnectOptions)>>,
    session: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    next_id: AtomicU64,
    /// Fail sends once this many have succeeded
    fail_after: Mutex<Option<usize>>,
    fail_connect: AtomicBool,
    fail_blocks: AtomicBool,
    send_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send after the first `n` fail
    pub fn fail_sends_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn fail_connects(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_blocks(&self, fail: bool) {
        self.fail_blocks.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of `send_message` calls, failed ones included
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn blocks(&self) -> Vec<BlockUpdate> {
        self.blocks.lock().unwrap().clone()
    }

    pub fn pairing_requests(&self) -> Vec<String> {
        self.pairing_requests.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    pub fn connects(&self) -> Vec<(Option<Credentials>, ConnectOptions)> {
        self.connects.lock().unwrap().clone()
    }

    /// Push an event into the current session
    pub async fn emit(&self, event: TransportEvent) {
        let tx = self.session.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Wait (in virtual time) until `connect` has been called `n` times
    pub async fn wait_for_connects(&self, n: usize) {
        while self.connect_count() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: ConnectOptions,
    ) -> Result<EventReceiver, TransportError> {
        self.connects.lock().unwrap().push((credentials, options));
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed("refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.session.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn send_message(
        &self,
        to: &Jid,
        content: MessageContent,
    ) -> Result<MessageKey, TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);

        let mut sent = self.sent.lock().unwrap();
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if sent.len() >= limit {
                return Err(TransportError::Rejected("media upload failed".to_string()));
            }
        }

        let id = format!("MSG{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        sent.push(SentMessage {
            to: to.clone(),
            content,
            at: Instant::now(),
        });
        Ok(MessageKey {
            remote_jid: to.clone(),
            id,
            from_me: true,
        })
    }

    async fn request_pairing_code(&self, phone: &str) -> Result<String, TransportError> {
        self.pairing_requests.lock().unwrap().push(phone.to_string());
        Ok("ABCD1234".to_string())
    }

    async fn update_block_status(
        &self,
        jid: &Jid,
        action: BlockAction,
    ) -> Result<(), TransportError> {
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("not allowed".to_string()));
        }
        self.blocks.lock().unwrap().push(BlockUpdate {
            jid: jid.clone(),
            action,
            at: Instant::now(),
        });
        Ok(())
    }
}

/// Credential store held in memory
#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<Option<Credentials>>,
    wipes: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn with(credentials: Credentials) -> Self {
        Self {
            credentials: Mutex::new(Some(credentials)),
            wipes: AtomicUsize::new(0),
        }
    }

    pub fn current(&self) -> Option<Credentials> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn wipe_count(&self) -> usize {
        self.wipes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>, CredentialError> {
        Ok(self.current())
    }

    async fn persist(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        *self.credentials.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }

    async fn wipe(&self) -> Result<(), CredentialError> {
        self.wipes.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock().unwrap() = None;
        Ok(())
    }
}
