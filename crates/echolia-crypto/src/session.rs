//! The per-request ECDH -> HKDF -> AEAD pipeline. Pure, stateless,
//! deterministic given its inputs.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use crate::{CryptoError, CryptoResult};

/// Domain-separation tag fixed by protocol. Any implementation must
/// reproduce this byte string exactly.
const HKDF_INFO: &[u8] = b"echolia-inference-v1";

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const EPHEMERAL_PUB_LEN: usize = 32;

/// The wire-level envelope: ciphertext, nonce, authentication tag, and the
/// sender's ephemeral public point. Lengths are enforced by construction.
#[derive(Debug, Clone)]
pub struct SealedEnvelope {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ephemeral_public: [u8; EPHEMERAL_PUB_LEN],
}

impl SealedEnvelope {
    /// Builds an envelope from raw (already base64-decoded) byte slices,
    /// rejecting any that don't match the fixed lengths the protocol
    /// requires. The ciphertext length is unconstrained (including zero).
    pub fn from_parts(
        ciphertext: Vec<u8>,
        nonce: &[u8],
        tag: &[u8],
        ephemeral_public: &[u8],
    ) -> CryptoResult<Self> {
        let nonce: [u8; NONCE_LEN] = nonce
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope(format!("nonce must be {NONCE_LEN} bytes")))?;
        let tag: [u8; TAG_LEN] = tag
            .try_into()
            .map_err(|_| CryptoError::MalformedEnvelope(format!("tag must be {TAG_LEN} bytes")))?;
        let ephemeral_public: [u8; EPHEMERAL_PUB_LEN] = ephemeral_public.try_into().map_err(|_| {
            CryptoError::MalformedEnvelope(format!(
                "ephemeral public key must be {EPHEMERAL_PUB_LEN} bytes"
            ))
        })?;
        Ok(Self {
            ciphertext,
            nonce,
            tag,
            ephemeral_public,
        })
    }
}

/// The E2EE envelope primitives. Holds no state of its own.
pub struct SessionCrypto;

impl SessionCrypto {
    /// `X25519(server_private, client_ephemeral_public)` followed by
    /// `HKDF-SHA256(ikm = shared_secret, salt = empty, info = "echolia-inference-v1", L = 32)`.
    /// The raw shared secret is zeroized before return.
    pub fn derive_key(server_private: &StaticSecret, client_ephemeral_public: &PublicKey) -> [u8; 32] {
        let shared = server_private.diffie_hellman(client_ephemeral_public);
        let mut secret_bytes = *shared.as_bytes();

        let hk = Hkdf::<Sha256>::new(None, &secret_bytes);
        let mut key = [0u8; 32];
        hk.expand(HKDF_INFO, &mut key)
            .expect("32 is a valid HKDF-SHA256 output length");

        secret_bytes.zeroize();
        key
    }

    /// Standard AEAD decryption with no additional-associated-data.
    /// Authentication failure is indistinguishable from any other decode
    /// error to callers -- both map to [`CryptoError::AuthenticationFailed`].
    pub fn open(key: &[u8; 32], envelope: &SealedEnvelope) -> CryptoResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        let nonce = Nonce::from_slice(&envelope.nonce);

        let mut combined = Vec::with_capacity(envelope.ciphertext.len() + TAG_LEN);
        combined.extend_from_slice(&envelope.ciphertext);
        combined.extend_from_slice(&envelope.tag);

        cipher
            .decrypt(nonce, combined.as_ref())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Generates a fresh 12-byte nonce from a CSPRNG for each invocation.
    /// Nonces are never reused under the same key: this is guaranteed by
    /// the single-request lifetime of the key, never by caller discipline.
    pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> CryptoResult<(Vec<u8>, [u8; NONCE_LEN], [u8; TAG_LEN])> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut combined = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::MalformedEnvelope(format!("seal failed: {e}")))?;

        let tag_start = combined.len() - TAG_LEN;
        let tag: [u8; TAG_LEN] = combined[tag_start..].try_into().expect("tag is always 16 bytes");
        combined.truncate(tag_start);

        Ok((combined, nonce_bytes, tag))
    }
}
