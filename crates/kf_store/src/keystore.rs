//! Private-key persistence over the injected `LocalStore`.
//!
//! Failure policy (deliberate): a missing key and a storage read failure
//! both surface as `None`. Downstream code treats the absent key as a
//! first-class state requiring regeneration, never as an exception.

use std::sync::Arc;

use tracing::warn;

use kf_crypto::identity::IdentityKeyPair;

use crate::error::StoreError;
use crate::local::LocalStore;

/// Logical key under which the PKCS#8 private key is stored.
pub const PRIVATE_KEY_KEY: &str = "privateKey";

pub struct KeyStore {
    store: Arc<dyn LocalStore>,
}

impl KeyStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Persist the private half in storage format (base64 PKCS#8).
    pub async fn persist_private_key(&self, pair: &IdentityKeyPair) -> Result<(), StoreError> {
        let encoded = pair.private_b64()?;
        self.store.set(PRIVATE_KEY_KEY, &encoded).await
    }

    /// Load the local private key, if any. Storage failures and corrupt
    /// stored material degrade to `None`.
    pub async fn load_private_key(&self) -> Option<IdentityKeyPair> {
        let stored = match self.store.get(PRIVATE_KEY_KEY).await {
            Ok(v) => v?,
            Err(e) => {
                warn!("key store read failed, treating as no key: {e}");
                return None;
            }
        };
        match IdentityKeyPair::from_private_b64(&stored) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!("stored private key did not parse, treating as no key: {e}");
                None
            }
        }
    }

    /// Irreversibly erase the local private key. Intentionally leaves the
    /// published public key alone. Storage failures are logged, not raised;
    /// sign-out must never crash on a flaky disk.
    pub async fn clear(&self) {
        if let Err(e) = self.store.remove(PRIVATE_KEY_KEY).await {
            warn!("key store clear failed: {e}");
        }
    }
}
