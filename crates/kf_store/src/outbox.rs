//! Durable local outbox.
//!
//! Entries are stored as one JSON array under the `"unsentMessages"` logical
//! key, appended in compose order. An entry is removed only after the
//! corresponding envelope is confirmed persisted at the relay (by client
//! token, not by index, so concurrent removals cannot strike the wrong
//! entry).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use kf_proto::OutboxEntry;

use crate::error::StoreError;
use crate::local::LocalStore;

/// Logical key under which the queue is stored.
pub const OUTBOX_KEY: &str = "unsentMessages";

pub struct Outbox {
    store: Arc<dyn LocalStore>,
    /// Serializes read-modify-write cycles on the stored array.
    write_lock: Mutex<()>,
}

impl Outbox {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append an entry; order-preserving.
    pub async fn push(&self, entry: OutboxEntry) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.push(entry);
        self.write_entries(&entries).await
    }

    /// Current queue contents in FIFO order. An unreadable or corrupt queue
    /// degrades to empty rather than blocking the caller.
    pub async fn snapshot(&self) -> Vec<OutboxEntry> {
        match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("outbox read failed, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.snapshot().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove the entry carrying `client_token`, keeping the rest in order.
    pub async fn remove(&self, client_token: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.retain(|e| e.client_token != client_token);
        self.write_entries(&entries).await
    }

    async fn read_entries(&self) -> Result<Vec<OutboxEntry>, StoreError> {
        match self.store.get(OUTBOX_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_entries(&self, entries: &[OutboxEntry]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return self.store.remove(OUTBOX_KEY).await;
        }
        let raw = serde_json::to_string(entries)?;
        self.store.set(OUTBOX_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryStore;

    #[tokio::test]
    async fn push_preserves_order_and_remove_is_by_token() {
        let outbox = Outbox::new(MemoryStore::new());
        let m1 = OutboxEntry::new("conv", "bob", "first");
        let m2 = OutboxEntry::new("conv", "bob", "second");
        let token1 = m1.client_token.clone();

        outbox.push(m1).await.unwrap();
        outbox.push(m2).await.unwrap();

        let snapshot = outbox.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].plaintext, "first");
        assert_eq!(snapshot[1].plaintext, "second");

        outbox.remove(&token1).await.unwrap();
        let snapshot = outbox.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].plaintext, "second");
    }

    #[tokio::test]
    async fn empty_queue_deletes_the_stored_key() {
        let store = MemoryStore::new();
        let outbox = Outbox::new(store.clone());
        let entry = OutboxEntry::new("conv", "bob", "only");
        let token = entry.client_token.clone();

        outbox.push(entry).await.unwrap();
        assert!(store.get(OUTBOX_KEY).await.unwrap().is_some());

        outbox.remove(&token).await.unwrap();
        assert!(store.get(OUTBOX_KEY).await.unwrap().is_none());
        assert!(outbox.is_empty().await);
    }

    #[tokio::test]
    async fn corrupt_queue_degrades_to_empty() {
        let store = MemoryStore::new();
        store.set(OUTBOX_KEY, "{ not json").await.unwrap();
        let outbox = Outbox::new(store);
        assert!(outbox.snapshot().await.is_empty());
    }
}
