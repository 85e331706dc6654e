//! Echolia Crypto - the cryptographic core of the E2EE inference gateway.
//!
//! This crate provides:
//! - `KeyStore`: the server's long-lived X25519 identity, with versioned
//!   crash-safe persistence and scheduled rotation.
//! - `SessionCrypto`: the stateless per-request ECDH -> HKDF -> AEAD
//!   pipeline that opens and seals envelopes.
//!
//! # Security invariant
//!
//! Shared secrets, derived keys, and plaintext are explicit-wiped before
//! their storage is released. Nothing here relies on ordinary
//! deallocation to erase secrets.

pub mod keystore;
pub mod session;

pub use keystore::{KeyStore, ServerIdentity};
pub use session::{SealedEnvelope, SessionCrypto};

use thiserror::Error;

/// Cryptographic errors surfaced by this crate.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("on-disk key blob is corrupt: {0}")]
    CorruptBlob(String),

    /// AEAD authentication failure. Deliberately indistinguishable from any
    /// other decode failure upstream -- see `echolia-orchestrator`'s
    /// mapping to the single `decrypt_failed` tag.
    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
