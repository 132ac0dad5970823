//! Incoming call rejection
//!
//! Every call signal schedules a block of the caller. The rejection notice is
//! rate limited: a caller gets at most one per debounce window. Callers are
//! tracked in a TTL map that a periodic sweep prunes; an expired entry counts
//! as absent even before the sweep reaches it.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use wr_core::config::CallerGuardConfig;
use wr_core::traits::Transport;
use wr_protocol::{BlockAction, CallOffer, Jid, MessageContent};

/// Debounced call handler
pub struct CallerGuard {
    transport: Arc<dyn Transport>,
    config: CallerGuardConfig,
    /// Caller -> end of its debounce window
    recent: DashMap<Jid, Instant>,
}

impl CallerGuard {
    pub fn new(transport: Arc<dyn Transport>, config: CallerGuardConfig) -> Self {
        Self {
            transport,
            config,
            recent: DashMap::new(),
        }
    }

    /// Handle a batch of call signals in order.
    ///
    /// Signals that carry no caller are skipped. Never fails.
    pub async fn on_calls(&self, calls: &[CallOffer]) {
        for call in calls {
            match call.caller() {
                Some(caller) => self.on_call_signal(caller).await,
                None => tracing::debug!("Ignoring call signal without caller: {:?}", call.id),
            }
        }
    }

    /// Handle one call signal from `caller`
    pub async fn on_call_signal(&self, caller: &Jid) {
        if self.claim_notice(caller) {
            tracing::info!("Rejecting call from {}", caller);
            let notice = MessageContent::text(self.config.notice.clone());
            if let Err(e) = self.transport.send_message(caller, notice).await {
                tracing::debug!("Failed to send call notice to {}: {}", caller, e);
            }
        } else {
            tracing::debug!("Call from {} within debounce window, notice suppressed", caller);
        }

        self.schedule_block(caller.clone());
    }

    /// Record `caller` if it has no live entry. Returns whether a notice is due.
    fn claim_notice(&self, caller: &Jid) -> bool {
        let now = Instant::now();
        let mut entry = self.recent.entry(caller.clone()).or_insert(now);
        if *entry > now {
            return false;
        }
        *entry = now + self.config.debounce_window;
        true
    }

    fn schedule_block(&self, caller: Jid) {
        let transport = Arc::clone(&self.transport);
        let delay = self.config.block_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match transport.update_block_status(&caller, BlockAction::Block).await {
                Ok(()) => tracing::debug!("Blocked caller {}", caller),
                Err(e) => tracing::debug!("Failed to block caller {}: {}", caller, e),
            }
        });
    }

    /// Whether `caller` is inside its debounce window
    pub fn is_debounced(&self, caller: &Jid) -> bool {
        self.recent
            .get(caller)
            .is_some_and(|expires_at| *expires_at > Instant::now())
    }

    /// Number of tracked callers, expired ones not yet swept included
    pub fn tracked(&self) -> usize {
        self.recent.len()
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.recent.len();
        self.recent.retain(|_, expires_at| *expires_at > now);
        before - self.recent.len()
    }
}

/// Run the periodic sweep until cancelled.
///
/// A zero sweep interval is raised to one millisecond.
pub async fn run_caller_sweep(guard: Arc<CallerGuard>, cancel: CancellationToken) {
    let period = guard.config.sweep_interval.max(Duration::from_millis(1));
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = guard.sweep();
                if removed > 0 {
                    tracing::trace!("Swept {} expired callers", removed);
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("Caller sweep shutting down");
                break;
            }
        }
    }
}
