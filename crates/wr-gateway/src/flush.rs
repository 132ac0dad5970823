//! Periodic message history flush
//!
//! The history lives in memory and is written back to its file on a fixed
//! interval. A last write happens when the task is cancelled so nothing
//! recorded before shutdown is lost.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use wr_core::history::MessageHistory;

/// Shortest flush period; a zero interval is raised to this
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Write the history to disk every `interval` until `cancel` fires, then
/// once more.
pub async fn run_history_flush(
    history: Arc<MessageHistory>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let interval = interval.max(MIN_INTERVAL);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and there is nothing new to write yet
    ticker.tick().await;

    tracing::info!(
        "Starting history flush task ({:?} interval, {})",
        interval,
        history.path().display()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                flush(&history).await;
            }
            _ = cancel.cancelled() => {
                flush(&history).await;
                tracing::info!("History flush task shutting down");
                break;
            }
        }
    }
}

async fn flush(history: &MessageHistory) {
    match history.write_to_file().await {
        Ok(true) => tracing::debug!(
            "Flushed {} messages to {}",
            history.len(),
            history.path().display()
        ),
        Ok(false) => {}
        Err(e) => tracing::warn!("Failed to flush message history: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wr_core::traits::MessageStore;
    use wr_protocol::{Jid, MessageKey, WireMessage};

    fn message(id: &str) -> WireMessage {
        WireMessage {
            key: MessageKey {
                remote_jid: Jid::new("201148795529@s.whatsapp.net"),
                id: id.to_string(),
                from_me: false,
            },
            message: Some(serde_json::json!({ "conversation": id })),
            timestamp: Some(1_700_000_000),
        }
    }

    #[tokio::test]
    async fn test_flush_on_interval_and_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let history = Arc::new(MessageHistory::new(&path, 50));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_history_flush(
            Arc::clone(&history),
            Duration::from_millis(20),
            cancel.clone(),
        ));

        history.record(&[message("A")]);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let reloaded = MessageHistory::new(&path, 50);
        assert_eq!(reloaded.read_from_file().await.unwrap(), 1);

        // Recorded after the last tick, written by the final flush
        history.record(&[message("B")]);
        cancel.cancel();
        task.await.unwrap();

        let reloaded = MessageHistory::new(&path, 50);
        assert_eq!(reloaded.read_from_file().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zero_interval_still_flushes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let history = Arc::new(MessageHistory::new(&path, 50));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_history_flush(
            Arc::clone(&history),
            Duration::ZERO,
            cancel.clone(),
        ));

        history.record(&[message("A")]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        let reloaded = MessageHistory::new(&path, 50);
        assert_eq!(reloaded.read_from_file().await.unwrap(), 1);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_write_failure_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        // Parent is a file, so every write fails
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let history = Arc::new(MessageHistory::new(blocker.join("store.json"), 50));
        history.record(&[message("A")]);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_history_flush(
            Arc::clone(&history),
            Duration::from_millis(10),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        cancel.cancel();
        task.await.unwrap();
    }
}
