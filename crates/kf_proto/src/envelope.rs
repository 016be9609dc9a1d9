//! Encrypted message envelope — what the relay stores.
//!
//! The relay is untrusted: it sees sender/conversation ids and timestamps
//! (metadata protection is out of scope) but only ciphertext for the body.
//! Records are immutable once written; `id` and `created_at` are assigned by
//! the relay's storage, so the client-side form (`EnvelopeDraft`) carries
//! neither.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored message record, as returned by pagination and realtime push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Relay-assigned opaque id. Also the dedup key for at-least-once push.
    pub id: String,

    /// Conversation this message belongs to (shared by exactly two actors).
    pub conversation_id: String,

    /// Author's actor id.
    pub sender_id: String,

    /// AES-256-GCM ciphertext of the body, base64.
    pub encrypted_content: String,

    /// 96-bit GCM nonce, base64. Unique per message.
    pub iv: String,

    /// Content key wrapped for the recipient's public key, base64.
    pub recipient_key_wrap: String,

    /// Content key wrapped for the sender's own public key, base64.
    /// Absent on records that predate the dual-wrap scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_key_wrap: Option<String>,

    /// Storage-assigned, monotonically non-decreasing per conversation.
    pub created_at: DateTime<Utc>,
}

/// Client-side envelope handed to the message store for insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeDraft {
    pub conversation_id: String,
    pub sender_id: String,
    pub encrypted_content: String,
    pub iv: String,
    pub recipient_key_wrap: String,
    pub sender_key_wrap: Option<String>,

    /// Locally generated idempotency token. Stores must treat a second
    /// insert with the same token as the first one succeeding (return the
    /// existing record), so a crash between remote persist and local
    /// dequeue cannot duplicate a message.
    pub client_token: String,
}
