//! Shared session status
//!
//! The connection state and the logged-in user are published together
//! through a `watch` channel. Exactly one [`SessionPublisher`] exists and it is
//! owned by the connection supervisor; every other component reads through a
//! cloneable [`SessionHandle`]. Readers always observe a complete snapshot, so
//! `connected` and `user` can never disagree.

use serde::Serialize;
use tokio::sync::watch;
use wr_protocol::UserInfo;

use crate::types::ConnectionState;

/// Snapshot of the session as seen by readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: ConnectionState,
    /// Logged-in account, present only while the session is open
    pub user: Option<UserInfo>,
}

impl SessionStatus {
    /// Whether outbound sends are currently allowed
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            user: None,
        }
    }
}

/// Write side of the session status
#[derive(Debug)]
pub struct SessionPublisher {
    tx: watch::Sender<SessionStatus>,
}

/// Read side of the session status
#[derive(Debug, Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<SessionStatus>,
}

/// Create a publisher/handle pair starting in `Disconnected`
pub fn session_channel() -> (SessionPublisher, SessionHandle) {
    let (tx, rx) = watch::channel(SessionStatus::default());
    (SessionPublisher { tx }, SessionHandle { rx })
}

impl SessionPublisher {
    /// Mark the session open for `user`
    pub fn set_open(&self, user: UserInfo) {
        self.tx.send_replace(SessionStatus {
            state: ConnectionState::Open,
            user: Some(user),
        });
    }

    /// Move to a non-open state, dropping the user
    pub fn set_state(&self, state: ConnectionState) {
        debug_assert!(state != ConnectionState::Open, "use set_open");
        self.tx.send_replace(SessionStatus { state, user: None });
    }

    /// A new read handle
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.tx.subscribe(),
        }
    }
}

impl SessionHandle {
    /// Current snapshot
    pub fn status(&self) -> SessionStatus {
        self.rx.borrow().clone()
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.rx.borrow().state
    }

    /// Whether the session is open
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Wait until the state satisfies `predicate`
    ///
    /// Returns `false` if the publisher is gone before that happens.
    pub async fn wait_for(&mut self, predicate: impl Fn(ConnectionState) -> bool) -> bool {
        self.rx.wait_for(|s| predicate(s.state)).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_protocol::Jid;

    fn user() -> UserInfo {
        UserInfo {
            id: Jid::new("15551234567:3@s.whatsapp.net"),
            name: Some("relay".to_string()),
        }
    }

    #[test]
    fn test_starts_disconnected() {
        let (_publisher, handle) = session_channel();
        assert_eq!(handle.state(), ConnectionState::Disconnected);
        assert!(handle.status().user.is_none());
    }

    #[test]
    fn test_open_then_disconnect_is_consistent() {
        let (publisher, handle) = session_channel();

        publisher.set_open(user());
        let status = handle.status();
        assert!(status.is_connected());
        assert_eq!(status.user, Some(user()));

        publisher.set_state(ConnectionState::Disconnected);
        let status = handle.status();
        assert!(!status.is_connected());
        assert!(status.user.is_none());
    }

    #[tokio::test]
    async fn test_wait_for_open() {
        let (publisher, handle) = session_channel();
        let mut waiter = handle.clone();

        let task =
            tokio::spawn(async move { waiter.wait_for(|s| s == ConnectionState::Open).await });
        publisher.set_state(ConnectionState::Connecting);
        publisher.set_open(user());

        assert!(task.await.unwrap());
        assert!(handle.is_open());
    }
}
