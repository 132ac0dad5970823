//! Lightweight message history
//!
//! Keeps the most recent messages of every conversation in memory so the
//! transport can look them up when it has to retry a delivery. The history is
//! loaded from a JSON file at startup and flushed back periodically by the
//! gateway.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use wr_protocol::{Jid, MessageKey, WireMessage};

use crate::error::StoreError;
use crate::traits::MessageStore;

/// On-disk layout
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    chats: BTreeMap<Jid, Vec<WireMessage>>,
}

/// Per-conversation message history capped at a fixed length
pub struct MessageHistory {
    path: PathBuf,
    max_per_chat: usize,
    chats: DashMap<Jid, VecDeque<WireMessage>>,
    /// Set when memory holds changes not yet written
    dirty: AtomicBool,
}

impl MessageHistory {
    /// Create an empty history persisted at `path`
    pub fn new(path: impl Into<PathBuf>, max_per_chat: usize) -> Self {
        Self {
            path: path.into(),
            max_per_chat: max_per_chat.max(1),
            chats: DashMap::new(),
            dirty: AtomicBool::new(false),
        }
    }

    /// The backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of conversations held
    pub fn chat_count(&self) -> usize {
        self.chats.len()
    }

    /// Total number of messages held
    pub fn len(&self) -> usize {
        self.chats.iter().map(|c| c.value().len()).sum()
    }

    /// Check if no messages are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the backing file into memory, replacing what is held.
    ///
    /// A missing file is not an error. Returns the number of messages loaded.
    pub async fn read_from_file(&self) -> Result<usize, StoreError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: HistoryFile = serde_json::from_slice(&content)?;

        self.chats.clear();
        let mut loaded = 0;
        for (jid, messages) in file.chats {
            let skip = messages.len().saturating_sub(self.max_per_chat);
            let queue: VecDeque<_> = messages.into_iter().skip(skip).collect();
            loaded += queue.len();
            self.chats.insert(jid, queue);
        }
        self.dirty.store(false, Ordering::Release);

        Ok(loaded)
    }

    /// Write memory to the backing file if anything changed since the last write.
    ///
    /// Returns whether a write happened.
    pub async fn write_to_file(&self) -> Result<bool, StoreError> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }

        let snapshot = HistoryFile {
            chats: self
                .chats
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().iter().cloned().collect()))
                .collect(),
        };

        if let Err(e) = self.write_snapshot(&snapshot).await {
            // Keep the changes marked so the next flush retries
            self.dirty.store(true, Ordering::Release);
            return Err(e);
        }
        Ok(true)
    }

    async fn write_snapshot(&self, snapshot: &HistoryFile) -> Result<(), StoreError> {
        let content = serde_json::to_vec(snapshot)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

impl MessageStore for MessageHistory {
    fn load_message(&self, key: &MessageKey) -> Option<serde_json::Value> {
        let chat = self.chats.get(&key.remote_jid.normalized())?;
        chat.iter()
            .rev()
            .find(|m| m.key.id == key.id)
            .and_then(|m| m.message.clone())
    }

    fn record(&self, messages: &[WireMessage]) {
        for message in messages {
            let jid = message.key.remote_jid.normalized();
            let mut chat = self.chats.entry(jid).or_default();

            // Upsert: an edit or status update replaces the earlier copy
            chat.retain(|m| m.key.id != message.key.id);
            chat.push_back(message.clone());
            while chat.len() > self.max_per_chat {
                chat.pop_front();
            }
        }

        if !messages.is_empty() {
            self.dirty.store(true, Ordering::Release);
        }
    }
}
