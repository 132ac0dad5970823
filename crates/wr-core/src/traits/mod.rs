//! Collaborator trait definitions

mod store;
mod transport;

pub use store::{CredentialStore, MessageStore};
pub use transport::{EventReceiver, Transport, TransportEvent};
