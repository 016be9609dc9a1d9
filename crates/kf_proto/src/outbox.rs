//! Durable outbox entry — a composed message not yet confirmed persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One not-yet-sent message. Stored plaintext in the local durable queue
/// (the queue lives on the trusted device; encryption happens at send time
/// with the then-current public keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub conversation_id: String,
    pub recipient_id: String,
    pub plaintext: String,
    pub enqueued_at: DateTime<Utc>,

    /// Idempotency token carried onto the `EnvelopeDraft`; see that type.
    pub client_token: String,
}

impl OutboxEntry {
    pub fn new(
        conversation_id: impl Into<String>,
        recipient_id: impl Into<String>,
        plaintext: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            recipient_id: recipient_id.into(),
            plaintext: plaintext.into(),
            enqueued_at: Utc::now(),
            client_token: Uuid::new_v4().to_string(),
        }
    }
}
