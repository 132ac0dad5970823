//! wr-gateway: Session supervisor and HTTP relay
//!
//! The gateway keeps one messaging session alive through a transport
//! sidecar, reconnecting with backoff and re-linking after a logout. An HTTP
//! API lets local callers check the session and send text, images and files
//! through it. Incoming calls are answered with a notice and the caller is
//! blocked.

pub mod bridge;
pub mod caller_guard;
pub mod dispatch;
pub mod display;
pub mod flush;
pub mod pairing;
pub mod reconnect;
pub mod server;
pub mod supervisor;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use wr_core::config::RelayConfig;
use wr_core::credentials::FileCredentialStore;
use wr_core::history::MessageHistory;
use wr_core::owner::load_owners;
use wr_core::traits::{CredentialStore, MessageStore, Transport};
use wr_core::Credentials;

pub use bridge::BridgeTransport;
pub use caller_guard::CallerGuard;
pub use dispatch::{DispatchError, DispatchGateway};
pub use pairing::{PairingCoordinator, PairingError, PairingRequest};
pub use supervisor::ConnectionSupervisor;

/// Run the relay until `cancel` fires.
///
/// Startup fails on an unusable pairing setup, unreadable owner or
/// credential files, or when the HTTP port cannot be bound. Everything after
/// that is self-healing.
pub async fn run(config: RelayConfig, cancel: CancellationToken) -> Result<()> {
    let owners = load_owners(&config.owner_file)
        .with_context(|| format!("Failed to load owners from {:?}", config.owner_file))?;
    if owners.is_empty() {
        tracing::info!("No owner numbers configured");
    } else {
        tracing::info!("Owners: {}", owners.join(", "));
    }

    let history = Arc::new(MessageHistory::new(
        &config.store.path,
        config.store.max_messages_per_chat,
    ));
    match history.read_from_file().await {
        Ok(loaded) => tracing::info!("Loaded {} messages from {:?}", loaded, history.path()),
        Err(e) => tracing::warn!("Starting with empty message history: {}", e),
    }

    let credentials = Arc::new(FileCredentialStore::new(&config.session.credentials_dir));
    let stored = credentials
        .load()
        .await
        .context("Failed to load session credentials")?;

    let transport: Arc<dyn Transport> = Arc::new(BridgeTransport::new(
        config.bridge.clone(),
        Arc::clone(&history) as Arc<dyn MessageStore>,
    ));

    let mut supervisor = ConnectionSupervisor::new(
        Arc::clone(&transport),
        credentials,
        Arc::clone(&history) as Arc<dyn MessageStore>,
        config.backoff.clone(),
        config.session.clone(),
    );

    if config.pairing.is_selected() {
        let coordinator =
            pairing_coordinator(&config, &owners, Arc::clone(&transport), stored.as_ref())
                .await?;
        supervisor = supervisor.with_pairing(coordinator);
    }

    let caller_guard = config
        .caller_guard
        .enabled
        .then(|| Arc::new(CallerGuard::new(Arc::clone(&transport), config.caller_guard.clone())));
    if let Some(guard) = &caller_guard {
        supervisor = supervisor.with_caller_guard(Arc::clone(guard));
    }

    let supervisor = Arc::new(supervisor);
    let dispatch = Arc::new(DispatchGateway::new(
        transport,
        supervisor.session(),
        &config.dispatch,
    ));

    let bind_addr = config.http.socket_address();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP API to {}", bind_addr))?;

    let supervisor_task = supervisor.start();

    let background = cancel.child_token();
    let flush_task = tokio::spawn(flush::run_history_flush(
        Arc::clone(&history),
        config.store.write_interval,
        background.clone(),
    ));
    let sweep_task = caller_guard.map(|guard| {
        tokio::spawn(crate::caller_guard::run_caller_sweep(
            guard,
            background.clone(),
        ))
    });

    display::print_success(&format!("🚀 API is running on port {}", config.http.port));
    display::print_info(&format!(
        "➡ Send requests to: http://localhost:{}",
        config.http.port
    ));

    let app = server::router(server::AppState {
        session: supervisor.session(),
        dispatch,
    });
    let served = server::serve(listener, app, cancel.clone()).await;

    supervisor.stop();
    background.cancel();
    if let Some(task) = supervisor_task {
        if let Err(e) = task.await {
            tracing::error!("Supervisor task failed: {}", e);
        }
    }
    if let Some(task) = sweep_task {
        let _ = task.await;
    }
    // The flush task writes one last time on the way out
    if let Err(e) = flush_task.await {
        tracing::error!("History flush task failed: {}", e);
    }

    served.context("HTTP server failed")?;
    tracing::info!("Relay shutdown complete");
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
pub fn shutdown_on_signal(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, initiating shutdown...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, initiating shutdown...");
            }
        }

        cancel.cancel();
    })
}

/// Pairing flow for pairing-code mode.
///
/// An unlinked session needs the number right away, so a bad one stops
/// startup. A linked session leaves it unresolved until a logout makes it
/// needed.
async fn pairing_coordinator(
    config: &RelayConfig,
    owners: &[String],
    transport: Arc<dyn Transport>,
    stored: Option<&Credentials>,
) -> Result<PairingCoordinator> {
    if config.pairing.mobile {
        return Err(PairingError::MobileUnsupported.into());
    }

    let pairing_config = config.pairing.clone();
    let owners = owners.to_vec();
    let coordinator = PairingCoordinator::deferred(
        transport,
        move || {
            pairing::resolve_request(
                &pairing_config,
                &owners,
                pairing::number_source(),
                pairing::prompt_phone_number,
            )
        },
        config.pairing.code_delay,
    );

    if stored.is_some_and(Credentials::is_registered) {
        tracing::debug!("Session already linked, pairing number left unresolved");
    } else {
        coordinator.resolve().await?;
    }

    Ok(coordinator)
}
