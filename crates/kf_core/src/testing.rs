//! In-memory collaborator implementations for tests.
//!
//! `InMemoryRelay` honors the `MessageStore` contract, including token
//! idempotency, per-conversation monotone `created_at`, and
//! insert-or-fetch-on-conflict conversation creation. Failure injection
//! (`set_offline`, `fail_token`) exercises the transient-failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use kf_proto::{ConversationKey, EnvelopeDraft, MessageEnvelope};

use crate::relay::{MessageStore, ProfileStore, RelayError};

// ── Profile store ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryProfiles {
    keys: RwLock<HashMap<String, String>>,
}

impl InMemoryProfiles {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfiles {
    async fn get_public_key(&self, actor_id: &str) -> Result<Option<String>, RelayError> {
        Ok(self.keys.read().await.get(actor_id).cloned())
    }

    async fn set_public_key(
        &self,
        actor_id: &str,
        public_key_b64: &str,
    ) -> Result<(), RelayError> {
        self.keys
            .write()
            .await
            .insert(actor_id.to_string(), public_key_b64.to_string());
        Ok(())
    }
}

// ── Message store ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct RelayState {
    envelopes: Vec<MessageEnvelope>,
    by_token: HashMap<String, String>,
    conversations: HashMap<ConversationKey, String>,
    last_created_at: HashMap<String, DateTime<Utc>>,
    fail_tokens: HashSet<String>,
    offline: bool,
}

#[derive(Default)]
pub struct InMemoryRelay {
    state: RwLock<RelayState>,
}

impl InMemoryRelay {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// While offline, every insert fails with a transport error.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// Inject a transport failure for one specific client token.
    pub async fn fail_token(&self, client_token: &str) {
        self.state
            .write()
            .await
            .fail_tokens
            .insert(client_token.to_string());
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.write().await;
        state.fail_tokens.clear();
        state.offline = false;
    }

    /// Everything persisted so far, in insertion order.
    pub async fn stored(&self) -> Vec<MessageEnvelope> {
        self.state.read().await.envelopes.clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryRelay {
    async fn insert(&self, draft: EnvelopeDraft) -> Result<MessageEnvelope, RelayError> {
        let mut state = self.state.write().await;
        if state.offline || state.fail_tokens.contains(&draft.client_token) {
            return Err(RelayError::Transport("injected failure".into()));
        }

        // Token idempotency: a repeat insert returns the original record.
        if let Some(existing_id) = state.by_token.get(&draft.client_token) {
            let existing = state
                .envelopes
                .iter()
                .find(|e| &e.id == existing_id)
                .cloned();
            if let Some(envelope) = existing {
                return Ok(envelope);
            }
        }

        // Non-decreasing created_at per conversation.
        let now = Utc::now();
        let created_at = match state.last_created_at.get(&draft.conversation_id) {
            Some(last) if *last > now => *last,
            _ => now,
        };
        state
            .last_created_at
            .insert(draft.conversation_id.clone(), created_at);

        let envelope = MessageEnvelope {
            id: Uuid::new_v4().to_string(),
            conversation_id: draft.conversation_id,
            sender_id: draft.sender_id,
            encrypted_content: draft.encrypted_content,
            iv: draft.iv,
            recipient_key_wrap: draft.recipient_key_wrap,
            sender_key_wrap: draft.sender_key_wrap,
            created_at,
        };
        state
            .by_token
            .insert(draft.client_token, envelope.id.clone());
        state.envelopes.push(envelope.clone());
        Ok(envelope)
    }

    async fn query_range(
        &self,
        conversation_id: &str,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<MessageEnvelope>, usize), RelayError> {
        let state = self.state.read().await;
        if state.offline {
            return Err(RelayError::Transport("injected failure".into()));
        }
        let all: Vec<_> = state
            .envelopes
            .iter()
            .filter(|e| e.conversation_id == conversation_id)
            .cloned()
            .collect();
        let total = all.len();
        let page = all.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn find_conversation(
        &self,
        key: &ConversationKey,
    ) -> Result<Option<String>, RelayError> {
        Ok(self.state.read().await.conversations.get(key).cloned())
    }

    async fn create_conversation(&self, key: &ConversationKey) -> Result<String, RelayError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.conversations.get(key) {
            // Uniqueness on the canonical pair: fetch existing on conflict.
            return Ok(existing.clone());
        }
        let id = Uuid::new_v4().to_string();
        state.conversations.insert(key.clone(), id.clone());
        Ok(id)
    }
}
