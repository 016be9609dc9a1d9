//! Identity key management
//!
//! Each actor owns one long-lived RSA-2048 keypair used for OAEP/SHA-256
//! key wrapping. The public half is exported as SPKI DER and published to
//! peers through the (external) profile store; the private half is exported
//! as PKCS#8 DER and never leaves local storage. Both cross the boundary
//! base64-encoded.
//!
//! Lifecycle: generated on first sign-in if absent, never rotated
//! automatically, erased only on explicit sign-out. Generation here is pure;
//! persistence and publication are the caller's job.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::rngs::OsRng;
use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// RSA modulus size. 2048 bits matches the strength the wrap format assumes.
pub const MODULUS_BITS: usize = 2048;

// ── Public key ────────────────────────────────────────────────────────────────

/// SPKI-DER RSA public key, base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyDer(Vec<u8>);

impl PublicKeyDer {
    pub fn to_b64(&self) -> String {
        B64.encode(&self.0)
    }

    /// Decode and structurally validate a published public key.
    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = B64
            .decode(s)
            .map_err(|e| CryptoError::MalformedEncoding(format!("public key base64: {e}")))?;
        RsaPublicKey::from_public_key_der(&bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("public key DER: {e}")))?;
        Ok(Self(bytes))
    }

    pub(crate) fn to_rsa(&self) -> Result<RsaPublicKey, CryptoError> {
        RsaPublicKey::from_public_key_der(&self.0)
            .map_err(|e| CryptoError::InvalidKey(format!("public key DER: {e}")))
    }

    /// Human-readable fingerprint: SHA-256 of the SPKI DER, truncated to
    /// 20 bytes, hex in groups of 4 for display.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        let hex: String = digest[..20].iter().map(|b| format!("{b:02x}")).collect();
        hex.as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ── Identity keypair ──────────────────────────────────────────────────────────

/// Long-term identity keypair. `RsaPrivateKey` zeroizes its material on drop.
pub struct IdentityKeyPair {
    public: PublicKeyDer,
    private: RsaPrivateKey,
}

impl IdentityKeyPair {
    /// Generate a fresh RSA-2048 keypair. Pure generation, no side effects.
    pub fn generate() -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::new(&mut OsRng, MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Self::from_private(private)
    }

    fn from_private(private: RsaPrivateKey) -> Result<Self, CryptoError> {
        let public_der = RsaPublicKey::from(&private)
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyGeneration(format!("SPKI export: {e}")))?;
        Ok(Self {
            public: PublicKeyDer(public_der.as_bytes().to_vec()),
            private,
        })
    }

    pub fn public(&self) -> &PublicKeyDer {
        &self.public
    }

    /// Public half in publish format (base64 SPKI DER).
    pub fn public_b64(&self) -> String {
        self.public.to_b64()
    }

    /// Private half in storage format (base64 PKCS#8 DER).
    pub fn private_b64(&self) -> Result<Zeroizing<String>, CryptoError> {
        let der = self
            .private
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKey(format!("PKCS#8 export: {e}")))?;
        Ok(Zeroizing::new(B64.encode(der.as_bytes())))
    }

    /// Rebuild a keypair from the storage format.
    pub fn from_private_b64(s: &str) -> Result<Self, CryptoError> {
        let der = Zeroizing::new(
            B64.decode(s)
                .map_err(|e| CryptoError::MalformedEncoding(format!("private key base64: {e}")))?,
        );
        let private = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| CryptoError::InvalidKey(format!("private key DER: {e}")))?;
        Self::from_private(private)
    }

    pub(crate) fn rsa_private(&self) -> &RsaPrivateKey {
        &self.private
    }

    /// RSA modulus length in bytes; every wrap produced for this key has
    /// exactly this length.
    pub fn modulus_len(&self) -> usize {
        self.private.size()
    }
}
