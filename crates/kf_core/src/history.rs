//! History assembler: one ordered, duplicate-free timeline per conversation,
//! merged from paginated fetches and at-least-once realtime pushes.

use std::collections::HashSet;

use kf_proto::MessageEnvelope;

use crate::error::CoreError;
use crate::relay::MessageStore;
use crate::router::DecryptOutcome;

/// One page of historical records, oldest first.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<MessageEnvelope>,
    pub has_more: bool,
}

/// Fetch a page ordered by creation time ascending.
pub async fn load_page(
    store: &dyn MessageStore,
    conversation_id: &str,
    offset: usize,
    page_size: usize,
) -> Result<Page, CoreError> {
    let (records, total) = store
        .query_range(conversation_id, offset, page_size)
        .await
        .map_err(|e| CoreError::PageFetchFailed(e.to_string()))?;
    let has_more = offset + records.len() < total;
    Ok(Page { records, has_more })
}

/// A stored envelope plus its terminal decryption result, ready to present.
#[derive(Debug, Clone)]
pub struct TimelineMessage {
    pub envelope: MessageEnvelope,
    pub body: DecryptOutcome,
}

/// In-memory assembled timeline for one conversation.
///
/// Invariants: non-decreasing `created_at`; at most one entry per envelope
/// id. Ties on `created_at` keep arrival order, which is accepted as good
/// enough (true concurrent-write ordering belongs to the storage layer).
#[derive(Default)]
pub struct Timeline {
    entries: Vec<TimelineMessage>,
    seen: HashSet<String>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a message unless its envelope id was already merged.
    /// Returns whether the message was inserted.
    pub fn insert(&mut self, message: TimelineMessage) -> bool {
        if !self.seen.insert(message.envelope.id.clone()) {
            return false;
        }
        let at = self
            .entries
            .partition_point(|m| m.envelope.created_at <= message.envelope.created_at);
        self.entries.insert(at, message);
        true
    }

    /// Merge a fetched page; duplicates against live-pushed records are
    /// dropped by id. Returns how many records were new.
    pub fn merge_page(&mut self, messages: impl IntoIterator<Item = TimelineMessage>) -> usize {
        let mut added = 0;
        for message in messages {
            if self.insert(message) {
                added += 1;
            }
        }
        added
    }

    pub fn messages(&self) -> &[TimelineMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
