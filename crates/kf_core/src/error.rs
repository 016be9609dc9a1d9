use thiserror::Error;

use crate::relay::RelayError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Transient send failure; the entry stays queued for the next drain.
    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Page fetch failed: {0}")]
    PageFetchFailed(String),

    /// Conversation get-or-create race the store could not resolve.
    #[error("Duplicate conversation for pair {0}")]
    DuplicateConversation(String),

    #[error("No local session")]
    NoSession,

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("Store error: {0}")]
    Store(#[from] kf_store::StoreError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] kf_crypto::CryptoError),
}
