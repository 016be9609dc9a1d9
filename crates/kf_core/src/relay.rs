//! Contracts for the external collaborators behind the untrusted relay.
//!
//! The core never talks to a network or a SQL schema directly; it sees the
//! profile store (public key directory) and the message store (envelope
//! persistence plus ordered range queries) through these traits. Realtime
//! push is not a trait: pushed rows arrive as `ClientEvent::MessageInserted`
//! on the client's event channel.

use async_trait::async_trait;
use thiserror::Error;

use kf_proto::{ConversationKey, EnvelopeDraft, MessageEnvelope};

#[derive(Debug, Error)]
pub enum RelayError {
    /// Network/storage trouble; retryable.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The store detected a second conversation row for one canonical pair
    /// and could not resolve it to a single record.
    #[error("Duplicate conversation")]
    DuplicateConversation,
}

/// Public key directory.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Published public key (base64 SPKI DER) for an actor, if any.
    async fn get_public_key(&self, actor_id: &str) -> Result<Option<String>, RelayError>;

    async fn set_public_key(&self, actor_id: &str, public_key_b64: &str)
        -> Result<(), RelayError>;
}

/// Envelope persistence at the relay.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a draft; the store assigns `id` and `created_at`
    /// (monotonically non-decreasing per conversation).
    ///
    /// MUST be idempotent on `draft.client_token`: a repeat insert returns
    /// the envelope stored by the first attempt instead of a duplicate.
    async fn insert(&self, draft: EnvelopeDraft) -> Result<MessageEnvelope, RelayError>;

    /// Records ordered by creation time ascending, plus the total count for
    /// the conversation.
    async fn query_range(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MessageEnvelope>, usize), RelayError>;

    async fn find_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<String>, RelayError>;

    /// Create the conversation for a canonical pair. Stores SHOULD enforce
    /// uniqueness on the pair and return the existing id on conflict;
    /// a store that cannot reports `DuplicateConversation`.
    async fn create_conversation(&self, key: &ConversationKey) -> Result<String, RelayError>;
}
