//! Client orchestrator and single-consumer event loop.
//!
//! Session-change listeners and realtime push callbacks arrive as
//! `ClientEvent`s on one mpsc channel, processed strictly in arrival order,
//! so all client state mutates on a single logical thread. Key replacement
//! takes the session write lock while decryption paths take read locks;
//! regeneration is therefore serialized against in-flight decrypts.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{info, warn};

use kf_crypto::identity::IdentityKeyPair;
use kf_proto::{ClientEvent, ConversationKey, MessageEnvelope, OutboxEntry};
use kf_store::{KeyStore, LocalStore, Outbox};

use crate::error::CoreError;
use crate::history::{self, Timeline, TimelineMessage};
use crate::queue::{DeliveryQueue, DrainReport};
use crate::relay::{MessageStore, ProfileStore, RelayError};
use crate::router::{decrypt_envelope, DecryptOutcome};

struct LocalSession {
    actor_id: String,
    /// `None` is a first-class state: signed in, but no usable private key
    /// (storage failed and regeneration failed). Decryption reports
    /// `KeyUnavailable`; sends stay queued.
    identity: Option<IdentityKeyPair>,
}

/// Outcome of a compose action.
#[derive(Debug)]
pub enum SendStatus {
    /// Persisted at the relay; the envelope is the stored record.
    Sent(MessageEnvelope),
    /// Left in the durable outbox; `queued` is the current queue depth for
    /// the "N messages queued, retry" notification.
    Queued { queued: usize },
}

/// Local private-key availability, for the key status surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    Available { fingerprint: String },
    Missing,
}

/// Result of merging one historical page into the timeline.
#[derive(Debug, Clone, Copy)]
pub struct PageLoad {
    /// Records not already present (live pushes may have arrived first).
    pub added: usize,
    pub has_more: bool,
}

pub struct Messenger {
    profiles: Arc<dyn ProfileStore>,
    messages: Arc<dyn MessageStore>,
    keystore: KeyStore,
    queue: DeliveryQueue,
    session: RwLock<Option<LocalSession>>,
    timelines: Mutex<HashMap<String, Timeline>>,
}

impl Messenger {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        messages: Arc<dyn MessageStore>,
        local: Arc<dyn LocalStore>,
    ) -> Self {
        let outbox = Arc::new(Outbox::new(local.clone()));
        Self {
            keystore: KeyStore::new(local),
            queue: DeliveryQueue::new(outbox, profiles.clone(), messages.clone()),
            profiles,
            messages,
            session: RwLock::new(None),
            timelines: Mutex::new(HashMap::new()),
        }
    }

    /// Single-consumer loop; runs until the event channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ClientEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
    }

    pub async fn handle_event(&self, event: ClientEvent) {
        match event {
            ClientEvent::SessionChanged { actor_id: Some(id) } => self.sign_in(id).await,
            ClientEvent::SessionChanged { actor_id: None } => self.sign_out().await,
            ClientEvent::MessageInserted(envelope) => self.on_message_inserted(envelope).await,
            ClientEvent::RetryRequested => {
                let report = self.request_retry().await;
                if report.remaining > 0 {
                    info!(queued = report.remaining, "messages still queued after retry");
                }
            }
        }
    }

    // ── Session and key lifecycle ────────────────────────────────────────────

    async fn sign_in(&self, actor_id: String) {
        {
            // Write lock: key load/creation is exclusive against decrypts.
            let mut guard = self.session.write().await;
            let identity = match self.keystore.load_private_key().await {
                Some(pair) => Some(pair),
                None => match self.provision_identity(&actor_id).await {
                    Ok(pair) => Some(pair),
                    Err(e) => {
                        warn!(%actor_id, "identity provisioning failed: {e}");
                        None
                    }
                },
            };
            *guard = Some(LocalSession { actor_id, identity });
        }

        // One drain pass when the session becomes available; the other
        // trigger is an explicit retry. Never a timer.
        let report = self.drain().await;
        if report.remaining > 0 {
            info!(queued = report.remaining, "messages still queued after sign-in drain");
        }
    }

    async fn sign_out(&self) {
        {
            let mut guard = self.session.write().await;
            *guard = None;
        }
        // Erases only the local private half; the published public key
        // stays so already-stored envelopes remain addressed to it.
        self.keystore.clear().await;
        self.timelines.lock().await.clear();
    }

    async fn provision_identity(&self, actor_id: &str) -> Result<IdentityKeyPair, CoreError> {
        // RSA-2048 generation is CPU-bound; keep it off the event loop.
        let pair = tokio::task::spawn_blocking(IdentityKeyPair::generate)
            .await
            .map_err(|e| kf_crypto::CryptoError::KeyGeneration(e.to_string()))??;
        self.keystore.persist_private_key(&pair).await?;
        self.profiles
            .set_public_key(actor_id, &pair.public_b64())
            .await?;
        info!(%actor_id, "generated and published a new identity key");
        Ok(pair)
    }

    pub async fn key_status(&self) -> KeyStatus {
        let guard = self.session.read().await;
        match guard.as_ref().and_then(|s| s.identity.as_ref()) {
            Some(identity) => KeyStatus::Available {
                fingerprint: identity.public().fingerprint(),
            },
            None => KeyStatus::Missing,
        }
    }

    // ── Compose and deliver ──────────────────────────────────────────────────

    /// Durably enqueue, then make one immediate send attempt. On failure the
    /// entry stays queued; the caller gets the queue depth, never an error,
    /// for anything transient.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        recipient_id: &str,
        plaintext: &str,
    ) -> Result<SendStatus, CoreError> {
        let entry = OutboxEntry::new(conversation_id, recipient_id, plaintext);
        self.queue.enqueue(entry.clone()).await?;

        let guard = self.session.read().await;
        let identity = match guard.as_ref() {
            Some(session) => match session.identity.as_ref() {
                Some(identity) => identity,
                None => {
                    return Ok(SendStatus::Queued {
                        queued: self.queue.queued_len().await,
                    })
                }
            },
            None => {
                return Ok(SendStatus::Queued {
                    queued: self.queue.queued_len().await,
                })
            }
        };
        let actor_id = guard.as_ref().map(|s| s.actor_id.clone()).unwrap_or_default();

        match self.queue.attempt_send(&entry, &actor_id, identity).await {
            Ok(stored) => {
                if let Err(e) = self.queue.dequeue(&entry.client_token).await {
                    warn!("dequeue failed after successful send: {e}");
                }
                // Immediate local echo; the push for this row dedups by id.
                let message = TimelineMessage {
                    envelope: stored.clone(),
                    body: DecryptOutcome::Decrypted(plaintext.to_string()),
                };
                self.timelines
                    .lock()
                    .await
                    .entry(stored.conversation_id.clone())
                    .or_default()
                    .insert(message);
                Ok(SendStatus::Sent(stored))
            }
            Err(e) => {
                warn!("immediate send failed, message stays queued: {e}");
                Ok(SendStatus::Queued {
                    queued: self.queue.queued_len().await,
                })
            }
        }
    }

    /// Explicit user retry; the second of the two drain triggers.
    pub async fn request_retry(&self) -> DrainReport {
        self.drain().await
    }

    pub async fn queued_len(&self) -> usize {
        self.queue.queued_len().await
    }

    async fn drain(&self) -> DrainReport {
        let guard = self.session.read().await;
        match guard.as_ref() {
            Some(LocalSession {
                actor_id,
                identity: Some(identity),
            }) => self.queue.drain_and_retry(actor_id, identity).await,
            _ => DrainReport {
                sent: 0,
                remaining: self.queue.queued_len().await,
            },
        }
    }

    // ── Conversations ────────────────────────────────────────────────────────

    /// Read-then-create on the canonicalized pair. The store resolves the
    /// concurrent-creation race (or reports it); no retry here.
    pub async fn get_or_create_conversation(&self, peer_id: &str) -> Result<String, CoreError> {
        let actor_id = {
            let guard = self.session.read().await;
            guard
                .as_ref()
                .map(|s| s.actor_id.clone())
                .ok_or(CoreError::NoSession)?
        };
        let key = ConversationKey::new(actor_id, peer_id);
        if let Some(id) = self.messages.find_conversation(&key).await? {
            return Ok(id);
        }
        match self.messages.create_conversation(&key).await {
            Ok(id) => Ok(id),
            Err(RelayError::DuplicateConversation) => {
                let (a, b) = key.members();
                Err(CoreError::DuplicateConversation(format!("{a}/{b}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Timeline ─────────────────────────────────────────────────────────────

    /// Fetch one historical page and merge it into the assembled timeline.
    pub async fn load_page(
        &self,
        conversation_id: &str,
        offset: usize,
        page_size: usize,
    ) -> Result<PageLoad, CoreError> {
        let page =
            history::load_page(self.messages.as_ref(), conversation_id, offset, page_size)
                .await?;
        let has_more = page.has_more;

        let decorated: Vec<TimelineMessage> = {
            let guard = self.session.read().await;
            page.records
                .into_iter()
                .map(|envelope| {
                    let body = Self::body_for(guard.as_ref(), &envelope);
                    TimelineMessage { envelope, body }
                })
                .collect()
        };

        let added = self
            .timelines
            .lock()
            .await
            .entry(conversation_id.to_string())
            .or_default()
            .merge_page(decorated);
        Ok(PageLoad { added, has_more })
    }

    /// Assembled timeline for a conversation, oldest first.
    pub async fn timeline(&self, conversation_id: &str) -> Vec<TimelineMessage> {
        self.timelines
            .lock()
            .await
            .get(conversation_id)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    async fn on_message_inserted(&self, envelope: MessageEnvelope) {
        let body = {
            let guard = self.session.read().await;
            Self::body_for(guard.as_ref(), &envelope)
        };
        let conversation_id = envelope.conversation_id.clone();
        let inserted = self
            .timelines
            .lock()
            .await
            .entry(conversation_id)
            .or_default()
            .insert(TimelineMessage { envelope, body });
        if !inserted {
            // At-least-once push redelivered a known row; nothing to do.
            tracing::debug!("duplicate realtime insert ignored");
        }
    }

    fn body_for(session: Option<&LocalSession>, envelope: &MessageEnvelope) -> DecryptOutcome {
        match session {
            Some(s) => decrypt_envelope(envelope, &s.actor_id, s.identity.as_ref()),
            None => DecryptOutcome::KeyUnavailable,
        }
    }
}
