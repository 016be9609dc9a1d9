//! kf_core — Keyfold messaging core
//!
//! Orchestrates the envelope protocol end to end: compose goes through the
//! envelope codec into the durable delivery queue and on to the relay's
//! message store; inbound records (paged or live-pushed) go through the
//! decryption router into the assembled timeline. All relay access is
//! behind collaborator traits; decryption failures become per-message
//! displayable variants, never propagated errors.
//!
//! # Module layout
//! - `relay`   — collaborator traits (profile store, message store)
//! - `router`  — wrap selection + terminal decryption outcomes
//! - `queue`   — durable delivery queue with idempotent drain
//! - `history` — page/push merge into ordered, duplicate-free timelines
//! - `client`  — `Messenger` orchestrator and single-consumer event loop
//! - `testing` — in-memory collaborators with failure injection
//! - `error`   — unified error type

pub mod client;
pub mod error;
pub mod history;
pub mod queue;
pub mod relay;
pub mod router;
pub mod testing;

pub use client::{KeyStatus, Messenger, PageLoad, SendStatus};
pub use error::CoreError;
pub use history::{Page, Timeline, TimelineMessage};
pub use queue::{DeliveryQueue, DrainReport};
pub use relay::{MessageStore, ProfileStore, RelayError};
pub use router::{decrypt_envelope, DecryptOutcome};
