//! End-to-end flows through two `Messenger` instances sharing one relay.

use std::sync::Arc;

use kf_core::testing::{InMemoryProfiles, InMemoryRelay};
use kf_core::{DecryptOutcome, KeyStatus, Messenger, ProfileStore, SendStatus};
use kf_crypto::{envelope, CryptoError};
use kf_proto::ClientEvent;
use kf_store::{KeyStore, MemoryStore};

struct World {
    profiles: Arc<InMemoryProfiles>,
    relay: Arc<InMemoryRelay>,
}

impl World {
    fn new() -> Self {
        Self {
            profiles: InMemoryProfiles::new(),
            relay: InMemoryRelay::new(),
        }
    }

    /// A signed-in messenger plus its local store (kept for key inspection).
    async fn actor(&self, actor_id: &str) -> (Messenger, Arc<MemoryStore>) {
        let local = MemoryStore::new();
        let messenger = Messenger::new(
            self.profiles.clone(),
            self.relay.clone(),
            local.clone(),
        );
        messenger
            .handle_event(ClientEvent::SessionChanged {
                actor_id: Some(actor_id.to_string()),
            })
            .await;
        (messenger, local)
    }
}

#[tokio::test]
async fn hello_from_alice_to_bob_decrypts_for_both() {
    let world = World::new();
    let (alice, alice_local) = world.actor("alice").await;
    let (bob, bob_local) = world.actor("bob").await;

    // Both sides converge on the same canonical conversation.
    let conv = alice.get_or_create_conversation("bob").await.unwrap();
    assert_eq!(bob.get_or_create_conversation("alice").await.unwrap(), conv);

    let status = alice.send_message(&conv, "bob", "hello").await.unwrap();
    let stored = match status {
        SendStatus::Sent(envelope) => envelope,
        SendStatus::Queued { queued } => panic!("unexpected queue depth {queued}"),
    };
    assert_eq!(stored.sender_id, "alice");
    assert!(stored.sender_key_wrap.is_some());
    assert_eq!(world.relay.stored().await.len(), 1);
    assert!(alice.queued_len().await == 0);

    // Bob assembles history and reads the plaintext.
    let page = bob.load_page(&conv, 0, 50).await.unwrap();
    assert_eq!(page.added, 1);
    assert!(!page.has_more);
    let timeline = bob.timeline(&conv).await;
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].body, DecryptOutcome::Decrypted("hello".into()));

    // Alice's own echo is already readable on her side.
    let timeline = alice.timeline(&conv).await;
    assert_eq!(timeline[0].body, DecryptOutcome::Decrypted("hello".into()));

    // Each wrap opens only under its matching private key.
    let alice_key = KeyStore::new(alice_local).load_private_key().await.unwrap();
    let bob_key = KeyStore::new(bob_local).load_private_key().await.unwrap();

    let via_recipient = envelope::decrypt(
        &stored.encrypted_content,
        &stored.recipient_key_wrap,
        &stored.iv,
        &bob_key,
    )
    .unwrap();
    assert_eq!(via_recipient, "hello");

    let sender_wrap = stored.sender_key_wrap.as_deref().unwrap();
    let via_sender =
        envelope::decrypt(&stored.encrypted_content, sender_wrap, &stored.iv, &alice_key)
            .unwrap();
    assert_eq!(via_sender, "hello");

    assert!(matches!(
        envelope::decrypt(
            &stored.encrypted_content,
            &stored.recipient_key_wrap,
            &stored.iv,
            &alice_key,
        ),
        Err(CryptoError::UnwrapFailed)
    ));
}

#[tokio::test]
async fn page_and_push_of_the_same_record_yield_one_entry() {
    let world = World::new();
    let (alice, _) = world.actor("alice").await;
    let (bob, _) = world.actor("bob").await;

    let conv = alice.get_or_create_conversation("bob").await.unwrap();
    let stored = match alice.send_message(&conv, "bob", "once only").await.unwrap() {
        SendStatus::Sent(envelope) => envelope,
        other => panic!("expected sent, got {other:?}"),
    };

    // Live push first, then the page containing the same row.
    bob.handle_event(ClientEvent::MessageInserted(stored.clone()))
        .await;
    let page = bob.load_page(&conv, 0, 50).await.unwrap();
    assert_eq!(page.added, 0);

    let timeline = bob.timeline(&conv).await;
    assert_eq!(timeline.len(), 1);

    // A redelivered push changes nothing either.
    bob.handle_event(ClientEvent::MessageInserted(stored)).await;
    assert_eq!(bob.timeline(&conv).await.len(), 1);
}

#[tokio::test]
async fn sign_in_publishes_key_and_sign_out_clears_it() {
    let world = World::new();
    let (alice, alice_local) = world.actor("alice").await;

    let published = world
        .profiles
        .get_public_key("alice")
        .await
        .unwrap()
        .expect("public key published on first sign-in");
    match alice.key_status().await {
        KeyStatus::Available { fingerprint } => assert!(!fingerprint.is_empty()),
        KeyStatus::Missing => panic!("key should be available after sign-in"),
    }

    alice
        .handle_event(ClientEvent::SessionChanged { actor_id: None })
        .await;
    assert_eq!(alice.key_status().await, KeyStatus::Missing);
    assert!(
        KeyStore::new(alice_local).load_private_key().await.is_none(),
        "private key must be erased on sign-out"
    );

    // The published public half is intentionally left in place.
    assert_eq!(
        world.profiles.get_public_key("alice").await.unwrap(),
        Some(published)
    );
}

#[tokio::test]
async fn second_sign_in_reuses_the_persisted_key() {
    let world = World::new();
    let (alice, local) = world.actor("alice").await;
    let first = world.profiles.get_public_key("alice").await.unwrap();

    // Restart: a fresh messenger over the same local store.
    drop(alice);
    let alice = Messenger::new(world.profiles.clone(), world.relay.clone(), local);
    alice
        .handle_event(ClientEvent::SessionChanged {
            actor_id: Some("alice".into()),
        })
        .await;

    // Same key, no regeneration, no republish of a different key.
    assert_eq!(world.profiles.get_public_key("alice").await.unwrap(), first);
}
