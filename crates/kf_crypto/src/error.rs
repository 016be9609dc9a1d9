use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("AEAD encryption failed")]
    AeadEncrypt,

    #[error("AEAD decryption failed (authentication tag mismatch, possible tampering)")]
    AuthenticationFailed,

    #[error("Key wrap failed")]
    WrapFailed,

    #[error("Key unwrap failed (OAEP unpad rejected: wrong key or corrupted wrap)")]
    UnwrapFailed,
}
