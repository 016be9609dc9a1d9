//! kf_crypto — Keyfold cryptographic primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited Rust crates.
//! - Secret material is zeroized on drop.
//! - Binary values cross public APIs as base64 text; malformed encodings are
//!   rejected before any cryptographic operation runs.
//!
//! # Module layout
//! - `identity` — long-term RSA-2048 identity keypairs (OAEP/SHA-256)
//! - `envelope` — per-message AES-256-GCM content encryption, double key wrap
//! - `error`    — unified error type

pub mod envelope;
pub mod error;
pub mod identity;

pub use error::CryptoError;
