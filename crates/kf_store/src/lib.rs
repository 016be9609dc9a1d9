//! kf_store — Keyfold local durable storage
//!
//! Everything the client must not lose across a restart lives here, behind
//! the injected `LocalStore` key-value capability:
//! - the actor's private key (`keystore`, logical key `"privateKey"`)
//! - the delivery outbox (`outbox`, logical key `"unsentMessages"`)
//!
//! Implementations: `MemoryStore` (tests, ephemeral profiles) and
//! `SqliteStore` (durable, WAL-mode SQLite via sqlx).

pub mod db;
pub mod error;
pub mod keystore;
pub mod local;
pub mod outbox;

pub use db::SqliteStore;
pub use error::StoreError;
pub use keystore::KeyStore;
pub use local::{LocalStore, MemoryStore};
pub use outbox::Outbox;
