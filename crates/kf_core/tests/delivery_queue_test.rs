//! Delivery-queue guarantees: no loss, no duplication, per-entry isolation.

use std::sync::Arc;

use kf_core::testing::{InMemoryProfiles, InMemoryRelay};
use kf_core::{DeliveryQueue, Messenger, ProfileStore, SendStatus};
use kf_crypto::identity::IdentityKeyPair;
use kf_proto::{ClientEvent, OutboxEntry};
use kf_store::{MemoryStore, Outbox};

async fn queue_for(
    profiles: &Arc<InMemoryProfiles>,
    relay: &Arc<InMemoryRelay>,
) -> (DeliveryQueue, IdentityKeyPair) {
    let alice = IdentityKeyPair::generate().unwrap();
    let bob = IdentityKeyPair::generate().unwrap();
    profiles
        .set_public_key("alice", &alice.public_b64())
        .await
        .unwrap();
    profiles
        .set_public_key("bob", &bob.public_b64())
        .await
        .unwrap();

    let outbox = Arc::new(Outbox::new(MemoryStore::new()));
    let queue = DeliveryQueue::new(outbox, profiles.clone(), relay.clone());
    (queue, alice)
}

#[tokio::test]
async fn failed_entry_stays_queued_while_later_entry_sends() {
    let profiles = InMemoryProfiles::new();
    let relay = InMemoryRelay::new();
    let (queue, alice) = queue_for(&profiles, &relay).await;

    let m1 = OutboxEntry::new("conv", "bob", "first, fails");
    let m2 = OutboxEntry::new("conv", "bob", "second, sends");
    relay.fail_token(&m1.client_token).await;

    queue.enqueue(m1.clone()).await.unwrap();
    queue.enqueue(m2).await.unwrap();

    // m1's failure must not block m2 in the same pass.
    let report = queue.drain_and_retry("alice", &alice).await;
    assert_eq!(report.sent, 1);
    assert_eq!(report.remaining, 1);
    assert_eq!(relay.stored().await.len(), 1);
    assert_eq!(queue.queued_len().await, 1);

    // The failed entry is still first in line for the next pass.
    relay.clear_failures().await;
    let report = queue.drain_and_retry("alice", &alice).await;
    assert_eq!(report.sent, 1);
    assert_eq!(queue.queued_len().await, 0);

    let stored = relay.stored().await;
    assert_eq!(stored.len(), 2);
    // Every stored envelope carries both wraps.
    assert!(stored.iter().all(|e| e.sender_key_wrap.is_some()));
}

#[tokio::test]
async fn crash_between_persist_and_dequeue_does_not_duplicate() {
    let profiles = InMemoryProfiles::new();
    let relay = InMemoryRelay::new();
    let (queue, alice) = queue_for(&profiles, &relay).await;

    let entry = OutboxEntry::new("conv", "bob", "exactly once");
    queue.enqueue(entry.clone()).await.unwrap();

    // First attempt persists remotely; the process "crashes" before the
    // local dequeue, so the entry is still in the outbox.
    queue.attempt_send(&entry, "alice", &alice).await.unwrap();
    assert_eq!(relay.stored().await.len(), 1);
    assert_eq!(queue.queued_len().await, 1);

    // The retry pass resends with the same client token; the store must
    // recognize it instead of duplicating.
    let report = queue.drain_and_retry("alice", &alice).await;
    assert_eq!(report.sent, 1);
    assert_eq!(queue.queued_len().await, 0);
    assert_eq!(relay.stored().await.len(), 1);
}

#[tokio::test]
async fn missing_recipient_key_is_a_transient_send_failure() {
    let profiles = InMemoryProfiles::new();
    let relay = InMemoryRelay::new();
    let (queue, alice) = queue_for(&profiles, &relay).await;

    let entry = OutboxEntry::new("conv", "carol", "no key published yet");
    queue.enqueue(entry).await.unwrap();

    let report = queue.drain_and_retry("alice", &alice).await;
    assert_eq!(report.sent, 0);
    assert_eq!(report.remaining, 1);
    assert!(relay.stored().await.is_empty());

    // Carol publishes a key; the queued message now goes out.
    let carol = IdentityKeyPair::generate().unwrap();
    profiles
        .set_public_key("carol", &carol.public_b64())
        .await
        .unwrap();
    let report = queue.drain_and_retry("alice", &alice).await;
    assert_eq!(report.sent, 1);
    assert_eq!(queue.queued_len().await, 0);
}

#[tokio::test]
async fn offline_compose_queues_and_explicit_retry_delivers() {
    let profiles = InMemoryProfiles::new();
    let relay = InMemoryRelay::new();
    let local = MemoryStore::new();
    let alice = Messenger::new(profiles.clone(), relay.clone(), local);
    alice
        .handle_event(ClientEvent::SessionChanged {
            actor_id: Some("alice".into()),
        })
        .await;
    let bob = IdentityKeyPair::generate().unwrap();
    profiles
        .set_public_key("bob", &bob.public_b64())
        .await
        .unwrap();
    let conv = alice.get_or_create_conversation("bob").await.unwrap();

    relay.set_offline(true).await;
    match alice.send_message(&conv, "bob", "hold this").await.unwrap() {
        SendStatus::Queued { queued } => assert_eq!(queued, 1),
        SendStatus::Sent(_) => panic!("relay is offline, send should queue"),
    }
    assert!(relay.stored().await.is_empty());

    relay.set_offline(false).await;
    let report = alice.request_retry().await;
    assert_eq!(report.sent, 1);
    assert_eq!(alice.queued_len().await, 0);
    assert_eq!(relay.stored().await.len(), 1);
}
