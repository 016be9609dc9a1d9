//! Decryption router: which wrap to unwrap for a stored envelope.
//!
//! The outcome is terminal per message and never retried automatically;
//! the same bytes with the same key cannot succeed where they first failed.
//! Nothing here propagates an error upward: every failure becomes a
//! displayable variant so one bad message cannot blank a timeline.

use tracing::{debug, warn};

use kf_crypto::envelope as codec;
use kf_crypto::identity::IdentityKeyPair;
use kf_proto::MessageEnvelope;

/// Terminal decryption state for one stored message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptOutcome {
    Decrypted(String),

    /// Self-authored message from before the dual-wrap scheme: no
    /// `sender_key_wrap`, and the recipient wrap is for a different private
    /// key, so it is never attempted.
    LegacyNoWrap,

    /// The wrap this actor would need is missing from the record.
    MissingKeyMaterial,

    /// No local private key at all; nothing was attempted.
    KeyUnavailable,

    /// Wrap or content present but cryptographically rejected (bad padding,
    /// tag mismatch, malformed field).
    DecryptFailed,
}

/// Select the correct wrap for the local actor and decrypt.
///
/// Selection order: missing key short-circuits everything; a self-authored
/// message uses only `sender_key_wrap`; anything else uses only
/// `recipient_key_wrap`.
pub fn decrypt_envelope(
    envelope: &MessageEnvelope,
    local_actor_id: &str,
    identity: Option<&IdentityKeyPair>,
) -> DecryptOutcome {
    let Some(identity) = identity else {
        debug!(envelope_id = %envelope.id, "no local private key, skipping decryption");
        return DecryptOutcome::KeyUnavailable;
    };

    let wrap = if envelope.sender_id == local_actor_id {
        match envelope.sender_key_wrap.as_deref() {
            Some(w) => w,
            None => {
                debug!(envelope_id = %envelope.id, "legacy self-authored record without sender wrap");
                return DecryptOutcome::LegacyNoWrap;
            }
        }
    } else if envelope.recipient_key_wrap.is_empty() {
        // Partial record: the schema requires this wrap, but a damaged or
        // half-written row can lack it.
        warn!(envelope_id = %envelope.id, "record is missing its recipient wrap");
        return DecryptOutcome::MissingKeyMaterial;
    } else {
        &envelope.recipient_key_wrap
    };

    match codec::decrypt(&envelope.encrypted_content, wrap, &envelope.iv, identity) {
        Ok(plaintext) => DecryptOutcome::Decrypted(plaintext),
        Err(e) => {
            warn!(envelope_id = %envelope.id, "decryption failed: {e}");
            DecryptOutcome::DecryptFailed
        }
    }
}
