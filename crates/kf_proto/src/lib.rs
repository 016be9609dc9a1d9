//! kf_proto — Keyfold record types shared across crates.
//!
//! - `envelope`     — stored message records and client-side drafts
//! - `conversation` — canonicalized two-party conversation key
//! - `outbox`       — durable delivery-queue entries
//! - `event`        — events for the single-consumer client loop

pub mod conversation;
pub mod envelope;
pub mod event;
pub mod outbox;

pub use conversation::ConversationKey;
pub use envelope::{EnvelopeDraft, MessageEnvelope};
pub use event::ClientEvent;
pub use outbox::OutboxEntry;
