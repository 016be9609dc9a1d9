//! Envelope codec
//!
//! One fresh AES-256 content key per message. The body is encrypted exactly
//! once with AES-256-GCM (96-bit random nonce); the content key is then
//! wrapped under RSA-OAEP/SHA-256, once per reader. Wrapping the same key
//! twice is what lets a sender re-read their own sent messages without ever
//! storing plaintext, at the cost of one extra OAEP operation.
//!
//! All fields cross this boundary as standard-alphabet base64 text.
//! Malformed encodings (bad base64, wrong nonce length, wrong wrap length)
//! are rejected before any cryptographic operation is attempted, so callers
//! can tell "garbage input" apart from "correct format, wrong key".

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng as AeadOsRng},
    AeadCore, Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::rngs::OsRng;
use rsa::Oaep;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::identity::{IdentityKeyPair, PublicKeyDer};

/// GCM nonce length (96 bits), unique per message.
pub const NONCE_LEN: usize = 12;
/// AES-256 content key length.
pub const CONTENT_KEY_LEN: usize = 32;

/// Ciphertext bundle for a single reader.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub content: String,
    pub key_wrap: String,
    pub iv: String,
}

/// Ciphertext bundle readable independently by recipient and sender.
/// Both wraps recover the same content key.
#[derive(Debug, Clone)]
pub struct DualSealed {
    pub content: String,
    pub recipient_wrap: String,
    pub sender_wrap: String,
    pub iv: String,
}

/// Encrypt `plaintext` for one reader.
pub fn encrypt_for_one(
    plaintext: &str,
    recipient: &PublicKeyDer,
) -> Result<Sealed, CryptoError> {
    let key = Aes256Gcm::generate_key(&mut AeadOsRng);
    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);

    let cipher = Aes256Gcm::new(&key);
    let content = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let key_wrap = wrap_key(key.as_slice(), recipient)?;

    Ok(Sealed {
        content: B64.encode(content),
        key_wrap,
        iv: B64.encode(nonce),
    })
}

/// Encrypt `plaintext` once, wrap the single content key for both readers.
pub fn encrypt_for_both(
    plaintext: &str,
    recipient: &PublicKeyDer,
    sender: &PublicKeyDer,
) -> Result<DualSealed, CryptoError> {
    let key = Aes256Gcm::generate_key(&mut AeadOsRng);
    let nonce = Aes256Gcm::generate_nonce(&mut AeadOsRng);

    // One symmetric pass; the same key is wrapped twice below.
    let cipher = Aes256Gcm::new(&key);
    let content = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::AeadEncrypt)?;

    let recipient_wrap = wrap_key(key.as_slice(), recipient)?;
    let sender_wrap = wrap_key(key.as_slice(), sender)?;

    Ok(DualSealed {
        content: B64.encode(content),
        recipient_wrap,
        sender_wrap,
        iv: B64.encode(nonce),
    })
}

/// Recover the content key from a wrap with the local private key.
///
/// Rejects wraps whose length does not match the key's modulus before
/// touching OAEP; a successful unwrap that is not exactly 32 bytes is
/// treated as `UnwrapFailed` (structurally valid OAEP, wrong payload).
pub fn unwrap_key(
    wrap_b64: &str,
    identity: &IdentityKeyPair,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let wrapped = decode_field("key wrap", wrap_b64)?;
    if wrapped.len() != identity.modulus_len() {
        return Err(CryptoError::MalformedEncoding(format!(
            "wrapped key must be {} bytes, got {}",
            identity.modulus_len(),
            wrapped.len()
        )));
    }

    let key = identity
        .rsa_private()
        .decrypt(Oaep::new::<Sha256>(), &wrapped)
        .map_err(|_| CryptoError::UnwrapFailed)?;
    if key.len() != CONTENT_KEY_LEN {
        return Err(CryptoError::UnwrapFailed);
    }
    Ok(Zeroizing::new(key))
}

/// Unwrap the content key, then AEAD-open the content.
///
/// A GCM tag mismatch surfaces as `AuthenticationFailed`, never as garbage
/// plaintext.
pub fn decrypt(
    content_b64: &str,
    wrap_b64: &str,
    iv_b64: &str,
    identity: &IdentityKeyPair,
) -> Result<String, CryptoError> {
    let content = decode_field("content", content_b64)?;
    let iv = decode_field("iv", iv_b64)?;
    if iv.len() != NONCE_LEN {
        return Err(CryptoError::MalformedEncoding(format!(
            "iv must be {NONCE_LEN} bytes, got {}",
            iv.len()
        )));
    }

    let key = unwrap_key(wrap_b64, identity)?;
    let cipher =
        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::UnwrapFailed)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), content.as_slice())
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    String::from_utf8(plaintext)
        .map_err(|_| CryptoError::MalformedEncoding("plaintext is not UTF-8".into()))
}

fn wrap_key(key: &[u8], public: &PublicKeyDer) -> Result<String, CryptoError> {
    let rsa = public.to_rsa()?;
    let wrapped = rsa
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), key)
        .map_err(|_| CryptoError::WrapFailed)?;
    Ok(B64.encode(wrapped))
}

fn decode_field(name: &str, b64: &str) -> Result<Vec<u8>, CryptoError> {
    B64.decode(b64)
        .map_err(|e| CryptoError::MalformedEncoding(format!("{name} base64: {e}")))
}
