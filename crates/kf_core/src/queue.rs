//! Delivery queue: compose-and-send that survives transient failures
//! without losing or duplicating messages.
//!
//! Every composed message is durably enqueued before its first send
//! attempt. A send encrypts with both parties' published public keys and
//! inserts at the relay; the entry is dequeued only after the insert is
//! confirmed. The `client_token` on each entry makes the insert idempotent,
//! so a crash between remote persist and local dequeue cannot resend.

use std::sync::Arc;

use tracing::{info, warn};

use kf_crypto::envelope;
use kf_crypto::identity::{IdentityKeyPair, PublicKeyDer};
use kf_proto::{EnvelopeDraft, MessageEnvelope, OutboxEntry};
use kf_store::Outbox;

use crate::error::CoreError;
use crate::relay::{MessageStore, ProfileStore};

pub struct DeliveryQueue {
    outbox: Arc<Outbox>,
    profiles: Arc<dyn ProfileStore>,
    messages: Arc<dyn MessageStore>,
}

/// Result of one drain pass, for the "N messages queued, retry" surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub sent: usize,
    pub remaining: usize,
}

impl DeliveryQueue {
    pub fn new(
        outbox: Arc<Outbox>,
        profiles: Arc<dyn ProfileStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            outbox,
            profiles,
            messages,
        }
    }

    /// Durably append to the outbox; order-preserving.
    pub async fn enqueue(&self, entry: OutboxEntry) -> Result<(), CoreError> {
        self.outbox.push(entry).await?;
        Ok(())
    }

    pub async fn queued_len(&self) -> usize {
        self.outbox.len().await
    }

    /// Remove a confirmed-persisted entry by its client token.
    pub async fn dequeue(&self, client_token: &str) -> Result<(), CoreError> {
        self.outbox.remove(client_token).await?;
        Ok(())
    }

    /// One encrypt-and-persist attempt for a single entry. Does not touch
    /// the outbox; callers dequeue on success.
    pub async fn attempt_send(
        &self,
        entry: &OutboxEntry,
        local_actor_id: &str,
        identity: &IdentityKeyPair,
    ) -> Result<MessageEnvelope, CoreError> {
        let recipient_pub = self.published_key_of(&entry.recipient_id).await?;
        let sender_pub = self.published_key_of(local_actor_id).await?;

        // Guard against a stale published key: a wrap under anything but the
        // current local public key would lock the sender out of their own
        // message.
        if &sender_pub != identity.public() {
            return Err(CoreError::SendFailed(format!(
                "published public key for {local_actor_id} does not match the local private key"
            )));
        }

        let sealed = envelope::encrypt_for_both(&entry.plaintext, &recipient_pub, &sender_pub)?;

        let draft = EnvelopeDraft {
            conversation_id: entry.conversation_id.clone(),
            sender_id: local_actor_id.to_string(),
            encrypted_content: sealed.content,
            iv: sealed.iv,
            recipient_key_wrap: sealed.recipient_wrap,
            sender_key_wrap: Some(sealed.sender_wrap),
            client_token: entry.client_token.clone(),
        };

        self.messages
            .insert(draft)
            .await
            .map_err(|e| CoreError::SendFailed(e.to_string()))
    }

    /// One FIFO pass over the current queue snapshot. A failed entry stays
    /// in place and does not block later entries; relative order is
    /// preserved for the next pass.
    pub async fn drain_and_retry(
        &self,
        local_actor_id: &str,
        identity: &IdentityKeyPair,
    ) -> DrainReport {
        let snapshot = self.outbox.snapshot().await;
        let mut report = DrainReport {
            sent: 0,
            remaining: 0,
        };

        for entry in snapshot {
            match self.attempt_send(&entry, local_actor_id, identity).await {
                Ok(stored) => {
                    info!(envelope_id = %stored.id, "queued message delivered");
                    if let Err(e) = self.outbox.remove(&entry.client_token).await {
                        // The envelope is persisted; the token keeps the next
                        // pass idempotent even though the entry survived.
                        warn!("dequeue failed after successful send: {e}");
                    }
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(conversation_id = %entry.conversation_id, "send attempt failed: {e}");
                    report.remaining += 1;
                }
            }
        }

        report
    }

    async fn published_key_of(&self, actor_id: &str) -> Result<PublicKeyDer, CoreError> {
        let b64 = self
            .profiles
            .get_public_key(actor_id)
            .await
            .map_err(|e| CoreError::SendFailed(e.to_string()))?
            .ok_or_else(|| {
                CoreError::SendFailed(format!("no published public key for {actor_id}"))
            })?;
        Ok(PublicKeyDer::from_b64(&b64)?)
    }
}
