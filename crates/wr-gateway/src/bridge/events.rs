//! Mapping sidecar events to transport events

use wr_core::traits::TransportEvent;
use wr_core::{CloseReason, Credentials};
use wr_protocol::{BridgeEvent, ConnectionPhase};

/// Translate one sidecar event. A connection update may carry several
/// things at once (a QR payload and a phase), so this yields a list.
pub fn translate_event(event: BridgeEvent) -> Vec<TransportEvent> {
    match event {
        BridgeEvent::ConnectionUpdate {
            connection,
            status_code,
            logged_out,
            qr,
            user,
        } => {
            let mut events = Vec::new();
            if let Some(qr) = qr {
                events.push(TransportEvent::Qr(qr));
            }
            match connection {
                Some(ConnectionPhase::Open) => match user {
                    Some(user) => events.push(TransportEvent::Opened { user }),
                    None => tracing::warn!("Session opened without user identity, ignoring"),
                },
                Some(ConnectionPhase::Close) => events.push(TransportEvent::Closed(CloseReason {
                    status_code,
                    logged_out,
                })),
                Some(ConnectionPhase::Connecting) => tracing::debug!("Sidecar connecting"),
                None => {}
            }
            events
        }
        BridgeEvent::CredsUpdate { creds } => {
            vec![TransportEvent::CredentialsUpdated(Credentials::new(creds))]
        }
        BridgeEvent::Call { calls } => vec![TransportEvent::Calls(calls)],
        BridgeEvent::MessagesUpsert { messages } => vec![TransportEvent::Messages(messages)],
    }
}
