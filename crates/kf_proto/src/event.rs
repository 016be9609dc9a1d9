//! Events consumed by the single-consumer client loop.
//!
//! Session-change listeners and realtime push callbacks are modeled as
//! messages on one channel, so everything that mutates client state runs on
//! a single logical thread in arrival order.

use serde::{Deserialize, Serialize};

use crate::envelope::MessageEnvelope;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientEvent {
    /// The local session changed. `Some(actor_id)` means signed in (triggers
    /// key load/generation and one outbox drain pass); `None` means signed
    /// out (clears the local private key).
    SessionChanged { actor_id: Option<String> },

    /// A row-insert notification from the realtime push collaborator.
    /// Delivered at least once, possibly out of order; dedup is by `id`.
    MessageInserted(MessageEnvelope),

    /// Explicit user request to retry queued messages.
    RetryRequested,
}
