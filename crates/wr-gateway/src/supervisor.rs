//! Session lifecycle supervisor
//!
//! The supervisor is the only writer of the session status. It runs one
//! transport session at a time and consumes that session's events in order
//! on a single task:
//!
//! ```text
//! Disconnected -> Connecting -> Open -> (close) -> Disconnected -> ...
//!                     |                                 |
//!                     +-------- (connect fails) --------+
//!                                                       |
//!                          max_attempts in a row -> Closed (cooldown)
//! ```
//!
//! Every close leads to a new attempt after a backoff delay. A close caused
//! by a logout wipes the stored credentials before that attempt, so the next
//! session starts unpaired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wr_core::config::{BackoffConfig, SessionConfig};
use wr_core::traits::{CredentialStore, MessageStore, Transport, TransportEvent};
use wr_core::{
    session_channel, CloseReason, ConnectionState, Credentials, SessionHandle, SessionPublisher,
};
use wr_protocol::{MessageContent, UserInfo};

use crate::caller_guard::CallerGuard;
use crate::display;
use crate::pairing::PairingCoordinator;
use crate::reconnect::{Delay, ReconnectPolicy};

/// How a session attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionOutcome {
    /// The session got to Open at least once
    reached_open: bool,
    reason: CloseReason,
}

impl SessionOutcome {
    fn failed() -> Self {
        Self {
            reached_open: false,
            reason: CloseReason::default(),
        }
    }
}

/// Owns the transport session and the session status
pub struct ConnectionSupervisor {
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    messages: Arc<dyn MessageStore>,
    publisher: SessionPublisher,
    caller_guard: Option<Arc<CallerGuard>>,
    pairing: Option<PairingCoordinator>,
    backoff: BackoffConfig,
    session: SessionConfig,
    /// Show QR codes (off when linking by pairing code)
    show_qr: bool,
    started: AtomicBool,
    cancel: CancellationToken,
}

impl ConnectionSupervisor {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        messages: Arc<dyn MessageStore>,
        backoff: BackoffConfig,
        session: SessionConfig,
    ) -> Self {
        let (publisher, _handle) = session_channel();
        Self {
            transport,
            credentials,
            messages,
            publisher,
            caller_guard: None,
            pairing: None,
            backoff,
            session,
            show_qr: true,
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    /// Route call signals through `guard`
    pub fn with_caller_guard(mut self, guard: Arc<CallerGuard>) -> Self {
        self.caller_guard = Some(guard);
        self
    }

    /// Link unregistered sessions with a pairing code instead of a QR code
    pub fn with_pairing(mut self, coordinator: PairingCoordinator) -> Self {
        self.pairing = Some(coordinator);
        self.show_qr = false;
        self
    }

    /// Read handle on the session status
    pub fn session(&self) -> SessionHandle {
        self.publisher.handle()
    }

    /// Token that stops supervision when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Start supervising in the background.
    ///
    /// Returns immediately. Only the first call starts anything; later calls
    /// return `None`.
    pub fn start(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            tracing::debug!("Supervisor already running");
            return None;
        }

        let this = Arc::clone(self);
        Some(tokio::spawn(async move { this.run().await }))
    }

    /// Stop supervising; the current session is dropped
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn run(&self) {
        let mut policy = ReconnectPolicy::from_config(&self.backoff);

        tracing::info!("Initializing WhatsApp client...");

        loop {
            let outcome = tokio::select! {
                outcome = self.run_session() => outcome,
                _ = self.cancel.cancelled() => break,
            };

            self.publisher.set_state(ConnectionState::Disconnected);

            if outcome.reason.is_logout() {
                self.handle_logout().await;
            }

            let delay = if outcome.reached_open {
                tracing::info!("Session closed: {}", outcome.reason);
                policy.after_open()
            } else {
                tracing::warn!(
                    "Session attempt {} failed before opening: {}",
                    policy.failures() + 1,
                    outcome.reason
                );
                policy.after_failure()
            };

            let delay = match delay {
                Delay::Backoff(delay) => delay,
                Delay::CircuitOpen(cooldown) => {
                    tracing::error!(
                        "{} consecutive attempts failed, pausing for {:?}",
                        self.backoff.max_attempts,
                        cooldown
                    );
                    self.publisher.set_state(ConnectionState::Closed);
                    cooldown
                }
            };

            tracing::debug!("Restarting session in {:?}", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        self.publisher.set_state(ConnectionState::Closed);
        tracing::info!("Supervisor stopped");
    }

    /// Run one transport session until it closes
    async fn run_session(&self) -> SessionOutcome {
        self.publisher.set_state(ConnectionState::Connecting);

        let credentials = match self.credentials.load().await {
            Ok(credentials) => credentials,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credentials: {}", e);
                None
            }
        };
        let registered = credentials.as_ref().is_some_and(Credentials::is_registered);

        let pairing = match &self.pairing {
            Some(pairing) if !registered => self.pairing_for(pairing).await,
            _ => None,
        };
        // Without a usable pairing number the session falls back to QR codes
        let show_qr = self.show_qr || (!registered && pairing.is_none());

        let options = self.session.connect_options(show_qr);
        let mut events = match self.transport.connect(credentials, options).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("Failed to start session: {}", e);
                return SessionOutcome::failed();
            }
        };

        if let Some(pairing) = pairing {
            pairing.spawn();
        }

        let mut reached_open = false;
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Closed(reason) => {
                    return SessionOutcome {
                        reached_open,
                        reason,
                    }
                }
                TransportEvent::Opened { user } => {
                    reached_open = true;
                    self.handle_open(user);
                }
                other => self.handle_event(other, show_qr).await,
            }
        }

        tracing::warn!("Transport event stream ended without a close");
        SessionOutcome {
            reached_open,
            reason: CloseReason::default(),
        }
    }

    fn handle_open(&self, user: UserInfo) {
        tracing::info!("WhatsApp connected as {}", user.id);
        display::print_success("WhatsApp Connected!");
        self.publisher.set_open(user.clone());

        if self.session.send_confirmation {
            let transport = Arc::clone(&self.transport);
            let text = confirmation_text(&self.session.bot_name, chrono::Local::now());
            tokio::spawn(async move {
                let own = user.id.normalized();
                if let Err(e) = transport.send_message(&own, MessageContent::text(text)).await {
                    tracing::warn!("Failed to send connection confirmation: {}", e);
                }
            });
        }
    }

    /// The pairing flow for an unregistered session, if its number resolves
    async fn pairing_for<'a>(
        &self,
        pairing: &'a PairingCoordinator,
    ) -> Option<&'a PairingCoordinator> {
        match pairing.resolve().await {
            Ok(request) => {
                tracing::info!("Linking with pairing code for {}", request.digits);
                Some(pairing)
            }
            Err(e) => {
                tracing::error!("Cannot link with a pairing code: {}", e);
                display::print_error("No usable pairing number, showing QR codes instead.");
                None
            }
        }
    }

    async fn handle_event(&self, event: TransportEvent, show_qr: bool) {
        match event {
            TransportEvent::CredentialsUpdated(credentials) => {
                if let Err(e) = self.credentials.persist(&credentials).await {
                    tracing::error!("Failed to persist credentials: {}", e);
                }
            }
            TransportEvent::Calls(calls) => match &self.caller_guard {
                Some(guard) => guard.on_calls(&calls).await,
                None => tracing::debug!("Ignoring {} call signals", calls.len()),
            },
            TransportEvent::Messages(messages) => self.messages.record(&messages),
            TransportEvent::Qr(payload) => {
                if show_qr {
                    display::print_qr(&payload);
                } else {
                    tracing::debug!("QR code received while pairing by code, ignoring");
                }
            }
            TransportEvent::Opened { .. } | TransportEvent::Closed(_) => {}
        }
    }

    async fn handle_logout(&self) {
        match self.credentials.wipe().await {
            Ok(()) => {
                tracing::warn!("Session logged out, credentials removed");
                display::print_error("Session logged out. Please re-authenticate.");
            }
            Err(e) => tracing::error!("Failed to remove logged-out session: {}", e),
        }
    }
}

/// Text of the message sent to the own account when a session opens
pub fn confirmation_text<Tz>(bot_name: &str, now: chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "🤖 {} Connected Successfully!\n⏰ Time: {}\n✅ Status: Online",
        bot_name,
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pairing::PairingRequest;
    use crate::testing::{MemoryCredentialStore, MockTransport};
    use std::time::Duration;
    use wr_core::config::CallerGuardConfig;
    use wr_core::history::MessageHistory;
    use wr_protocol::{CallOffer, Jid, MessageKey, WireMessage};

    struct Harness {
        transport: Arc<MockTransport>,
        credentials: Arc<MemoryCredentialStore>,
        history: Arc<MessageHistory>,
        supervisor: Arc<ConnectionSupervisor>,
        session: SessionHandle,
    }

    fn backoff() -> BackoffConfig {
        BackoffConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn registered() -> Credentials {
        Credentials::new(serde_json::json!({ "registered": true, "me": "100" }))
    }

    fn harness_with(
        credentials: MemoryCredentialStore,
        backoff: BackoffConfig,
        build: impl FnOnce(ConnectionSupervisor, Arc<dyn Transport>) -> ConnectionSupervisor,
    ) -> Harness {
        let transport = Arc::new(MockTransport::new());
        let credentials = Arc::new(credentials);
        let history = Arc::new(MessageHistory::new("unused.json", 10));
        let supervisor = ConnectionSupervisor::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&credentials) as Arc<dyn CredentialStore>,
            Arc::clone(&history) as Arc<dyn MessageStore>,
            backoff,
            SessionConfig::default(),
        );
        let supervisor = Arc::new(build(supervisor, Arc::clone(&transport) as Arc<dyn Transport>));
        let session = supervisor.session();
        Harness {
            transport,
            credentials,
            history,
            supervisor,
            session,
        }
    }

    fn harness(credentials: MemoryCredentialStore) -> Harness {
        harness_with(credentials, backoff(), |s, _| s)
    }

    fn user() -> UserInfo {
        UserInfo {
            id: Jid::new("201148795529:12@s.whatsapp.net"),
            name: Some("relay".to_string()),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let h = harness(MemoryCredentialStore::with(registered()));

        assert!(h.supervisor.start().is_some());
        assert!(h.supervisor.start().is_none());
        settle().await;

        assert_eq!(h.transport.connect_count(), 1);
        assert_eq!(h.session.state(), ConnectionState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_publishes_user_and_confirms() {
        let h = harness(MemoryCredentialStore::with(registered()));
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;

        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        settle().await;

        let status = h.session.status();
        assert!(status.is_connected());
        assert_eq!(status.user, Some(user()));

        let sent = h.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "201148795529@s.whatsapp.net");
        match &sent[0].content {
            MessageContent::Text { text } => {
                assert!(text.contains("Codio API Bot"));
                assert!(text.contains("Status: Online"));
            }
            other => panic!("unexpected content {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_visible_immediately() {
        let h = harness(MemoryCredentialStore::with(registered()));
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;

        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        let mut waiter = h.session.clone();
        assert!(waiter.wait_for(|s| s == ConnectionState::Open).await);

        h.transport
            .emit(TransportEvent::Closed(CloseReason::with_code(428)))
            .await;
        assert!(waiter.wait_for(|s| s != ConnectionState::Open).await);
        assert!(h.session.status().user.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_codes_wipe_before_restart() {
        for reason in [
            CloseReason::with_code(401),
            CloseReason {
                status_code: None,
                logged_out: true,
            },
        ] {
            let h = harness(MemoryCredentialStore::with(registered()));
            h.supervisor.start();
            h.transport.wait_for_connects(1).await;
            h.transport.emit(TransportEvent::Opened { user: user() }).await;
            h.transport.emit(TransportEvent::Closed(reason)).await;

            h.transport.wait_for_connects(2).await;
            assert_eq!(h.credentials.wipe_count(), 1);
            let connects = h.transport.connects();
            assert!(connects[0].0.is_some());
            assert!(connects[1].0.is_none(), "restart after {:?} kept credentials", reason);
            h.supervisor.stop();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_codes_keep_credentials() {
        for code in [408, 428, 440, 500, 503, 515] {
            let h = harness(MemoryCredentialStore::with(registered()));
            h.supervisor.start();
            h.transport.wait_for_connects(1).await;
            h.transport.emit(TransportEvent::Opened { user: user() }).await;
            h.transport
                .emit(TransportEvent::Closed(CloseReason::with_code(code)))
                .await;

            h.transport.wait_for_connects(2).await;
            assert_eq!(h.credentials.wipe_count(), 0, "code {}", code);
            assert_eq!(h.transport.connects()[1].0, Some(registered()));
            h.supervisor.stop();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_credentials_updates_are_persisted() {
        let h = harness(MemoryCredentialStore::default());
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;

        let updated = Credentials::new(serde_json::json!({ "registered": false, "k": 1 }));
        h.transport
            .emit(TransportEvent::CredentialsUpdated(updated.clone()))
            .await;
        settle().await;

        assert_eq!(h.credentials.current(), Some(updated));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempts_back_off() {
        let h = harness(MemoryCredentialStore::default());
        h.transport.fail_connects(true);
        h.supervisor.start();

        // Attempts at 0s, 1s, 3s, 7s
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.transport.connect_count(), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.transport.connect_count(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.transport.connect_count(), 3);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(h.transport.connect_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_opens_after_max_attempts() {
        let config = BackoffConfig {
            max_attempts: 3,
            ..backoff()
        };
        let h = harness_with(MemoryCredentialStore::default(), config, |s, _| s);
        h.transport.fail_connects(true);
        h.supervisor.start();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.transport.connect_count(), 3);
        assert_eq!(h.session.state(), ConnectionState::Closed);

        // Cooldown runs from the third failure at 3s
        tokio::time::sleep(Duration::from_secs(290)).await;
        assert_eq!(h.transport.connect_count(), 3);
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.transport.connect_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_session_resets_backoff() {
        let h = harness(MemoryCredentialStore::with(registered()));
        h.transport.fail_connects(true);
        h.supervisor.start();

        // Fail three times: attempts at 0s, 1s, 3s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(h.transport.connect_count(), 3);

        // Fourth attempt at 7s opens, then closes
        h.transport.fail_connects(false);
        h.transport.wait_for_connects(4).await;
        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        h.transport
            .emit(TransportEvent::Closed(CloseReason::with_code(515)))
            .await;
        settle().await;

        // Back to the initial delay
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(h.transport.connect_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_only_without_registration() {
        let h = harness_with(MemoryCredentialStore::default(), backoff(), |s, transport| {
            let request = PairingRequest::parse("201148795529").unwrap();
            s.with_pairing(PairingCoordinator::new(
                transport,
                request,
                Duration::from_secs(3),
            ))
        });
        h.supervisor.start();
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert_eq!(h.transport.pairing_requests(), vec!["201148795529"]);
        assert!(!h.transport.connects()[0].1.emit_qr);

        let h = harness_with(
            MemoryCredentialStore::with(registered()),
            backoff(),
            |s, transport| {
                let request = PairingRequest::parse("201148795529").unwrap();
                s.with_pairing(PairingCoordinator::new(
                    transport,
                    request,
                    Duration::from_secs(3),
                ))
            },
        );
        h.supervisor.start();
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(h.transport.pairing_requests().is_empty());
    }

    fn deferred_pairing(
        number: &'static str,
    ) -> impl FnOnce(ConnectionSupervisor, Arc<dyn Transport>) -> ConnectionSupervisor {
        move |s, transport| {
            s.with_pairing(PairingCoordinator::deferred(
                transport,
                move || PairingRequest::parse(number),
                Duration::from_secs(3),
            ))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relink_with_pairing_code_after_logout() {
        let h = harness_with(
            MemoryCredentialStore::with(registered()),
            backoff(),
            deferred_pairing("201148795529"),
        );
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;
        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        settle().await;
        assert!(h.transport.pairing_requests().is_empty());

        h.transport
            .emit(TransportEvent::Closed(CloseReason::with_code(401)))
            .await;
        h.transport.wait_for_connects(2).await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        let connects = h.transport.connects();
        assert!(connects[1].0.is_none());
        assert!(!connects[1].1.emit_qr);
        assert_eq!(h.transport.pairing_requests(), vec!["201148795529"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_pairing_number_falls_back_to_qr() {
        // A linked session never looks at the number
        let h = harness_with(
            MemoryCredentialStore::with(registered()),
            backoff(),
            deferred_pairing("12"),
        );
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;
        assert!(!h.transport.connects()[0].1.emit_qr);

        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        h.transport
            .emit(TransportEvent::Closed(CloseReason::with_code(401)))
            .await;
        h.transport.wait_for_connects(2).await;
        tokio::time::sleep(Duration::from_secs(4)).await;

        assert!(h.transport.connects()[1].1.emit_qr);
        assert!(h.transport.pairing_requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_and_messages_are_routed() {
        let h = harness_with(
            MemoryCredentialStore::with(registered()),
            backoff(),
            |s, transport| {
                s.with_caller_guard(Arc::new(CallerGuard::new(
                    transport,
                    CallerGuardConfig::default(),
                )))
            },
        );
        h.supervisor.start();
        h.transport.wait_for_connects(1).await;

        let message = WireMessage {
            key: MessageKey {
                remote_jid: Jid::new("5@s.whatsapp.net"),
                id: "IN1".to_string(),
                from_me: false,
            },
            message: Some(serde_json::json!({ "conversation": "hello" })),
            timestamp: None,
        };
        h.transport
            .emit(TransportEvent::Messages(vec![message.clone()]))
            .await;
        h.transport
            .emit(TransportEvent::Calls(vec![CallOffer {
                from: Some(Jid::new("7@s.whatsapp.net")),
                ..Default::default()
            }]))
            .await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert!(h.history.load_message(&message.key).is_some());
        assert_eq!(h.transport.sent().len(), 1);
        assert_eq!(h.transport.blocks().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_supervision() {
        let h = harness(MemoryCredentialStore::with(registered()));
        let task = h.supervisor.start().unwrap();
        h.transport.wait_for_connects(1).await;
        h.transport.emit(TransportEvent::Opened { user: user() }).await;
        settle().await;

        h.supervisor.stop();
        task.await.unwrap();

        assert_eq!(h.session.state(), ConnectionState::Closed);
        assert!(h.session.status().user.is_none());
    }

    #[test]
    fn test_confirmation_text() {
        use chrono::TimeZone;
        let now = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(
            confirmation_text("Codio API Bot", now),
            "🤖 Codio API Bot Connected Successfully!\n⏰ Time: 2024-05-01 09:30:00\n✅ Status: Online"
        );
    }
}
