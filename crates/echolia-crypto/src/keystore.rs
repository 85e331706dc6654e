//! The server's long-lived X25519 identity: load, persist, rotate.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{CryptoError, CryptoResult};

const BLOB_VERSION: u8 = 0x01;
const HEADER_LEN: usize = 1 + 32 + 32 + 8 + 8; // version + scalar + point + 2 instants

/// The server's current X25519 key pair plus its lifecycle metadata.
///
/// Invariant: `public` always equals the derivation from `private`; the
/// `identifier` string uniquely binds this (private, public) pair.
pub struct ServerIdentity {
    private: StaticSecret,
    public: PublicKey,
    identifier: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl ServerIdentity {
    fn generate(rotation_period: StdDuration) -> Self {
        let private = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&private);
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(rotation_period).unwrap_or(chrono::Duration::zero());
        let identifier = format!("srv-{}", created_at.format("%Y-%m"));
        Self {
            private,
            public,
            identifier,
            created_at,
            expires_at,
        }
    }

    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.identifier.len());
        out.push(BLOB_VERSION);
        out.extend_from_slice(&self.private.to_bytes());
        out.extend_from_slice(self.public.as_bytes());
        out.extend_from_slice(&self.created_at.timestamp().to_be_bytes());
        out.extend_from_slice(&self.expires_at.timestamp().to_be_bytes());
        out.extend_from_slice(self.identifier.as_bytes());
        out
    }

    fn from_blob(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CryptoError::CorruptBlob(format!(
                "blob too short: {} bytes",
                bytes.len()
            )));
        }
        if bytes[0] != BLOB_VERSION {
            return Err(CryptoError::CorruptBlob(format!(
                "unsupported version byte {:#x}",
                bytes[0]
            )));
        }
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&bytes[1..33]);
        let mut point = [0u8; 32];
        point.copy_from_slice(&bytes[33..65]);

        let private = StaticSecret::from(scalar);
        let public = PublicKey::from(&private);
        if public.as_bytes() != &point {
            return Err(CryptoError::CorruptBlob(
                "public point does not match private scalar derivation".into(),
            ));
        }

        let created_at = i64::from_be_bytes(bytes[65..73].try_into().unwrap());
        let expires_at = i64::from_be_bytes(bytes[73..81].try_into().unwrap());
        let identifier = String::from_utf8(bytes[81..].to_vec())
            .map_err(|e| CryptoError::CorruptBlob(format!("identifier not UTF-8: {e}")))?;

        Ok(Self {
            private,
            public,
            identifier,
            created_at: DateTime::from_timestamp(created_at, 0).ok_or_else(|| {
                CryptoError::CorruptBlob("creation instant out of range".into())
            })?,
            expires_at: DateTime::from_timestamp(expires_at, 0).ok_or_else(|| {
                CryptoError::CorruptBlob("expiration instant out of range".into())
            })?,
        })
    }

    /// Best-effort extraction of just the expiry timestamp from a blob that
    /// failed full parsing. The expiry field sits at a fixed offset
    /// regardless of which other field is the actual source of corruption
    /// (bad version byte, mismatched point, non-UTF-8 identifier), so this
    /// can often recover a usable signal even out of a blob `from_blob`
    /// rejected outright. Returns `None` when the blob is too short to
    /// contain the field at all.
    fn peek_expiry(bytes: &[u8]) -> Option<DateTime<Utc>> {
        if bytes.len() < HEADER_LEN {
            return None;
        }
        let expires_at = i64::from_be_bytes(bytes[73..81].try_into().ok()?);
        DateTime::from_timestamp(expires_at, 0)
    }
}

/// Read-only view of a public identity, safe to expose externally.
#[derive(Debug, Clone)]
pub struct PublicIdentityView {
    pub public_key: [u8; 32],
    pub key_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Owns the server's X25519 identity and its rotation schedule.
///
/// All reads are effectively lock-free (uncontended `RwLock::read`) after
/// initialization; rotation serializes on the same lock taken for write.
pub struct KeyStore {
    identity: RwLock<ServerIdentity>,
    persist_path: PathBuf,
    rotation_period: StdDuration,
}

impl KeyStore {
    /// Idempotent: loads an existing identity from `persist_path`, or
    /// generates and persists a fresh one if absent or expired.
    ///
    /// Persistence failure here is fatal -- the process must not serve
    /// requests without a durable identity.
    pub fn initialize(persist_path: impl AsRef<Path>, rotation_period: StdDuration) -> CryptoResult<Self> {
        let persist_path = persist_path.as_ref().to_path_buf();
        let now = Utc::now();

        let identity = match fs::read(&persist_path) {
            Ok(bytes) => match ServerIdentity::from_blob(&bytes) {
                Ok(identity) if !identity.is_stale(now) => identity,
                Ok(_stale) => {
                    tracing::info!("loaded key identity has expired, rotating on startup");
                    let fresh = ServerIdentity::generate(rotation_period);
                    write_blob(&persist_path, &fresh.to_blob())?;
                    fresh
                }
                Err(e) => {
                    let rotation_due = ServerIdentity::peek_expiry(&bytes)
                        .map(|expires_at| expires_at <= now)
                        .unwrap_or(false);
                    if !rotation_due {
                        tracing::error!(error = %e, "on-disk key blob is corrupt and rotation was not due");
                        return Err(e);
                    }
                    tracing::warn!(error = %e, "on-disk key blob is corrupt but rotation was already due, generating a fresh identity");
                    let fresh = ServerIdentity::generate(rotation_period);
                    write_blob(&persist_path, &fresh.to_blob())?;
                    fresh
                }
            },
            Err(_not_found) => {
                tracing::info!("no existing key identity found, generating one");
                let fresh = ServerIdentity::generate(rotation_period);
                write_blob(&persist_path, &fresh.to_blob())?;
                fresh
            }
        };

        Ok(Self {
            identity: RwLock::new(identity),
            persist_path,
            rotation_period,
        })
    }

    /// Returns a snapshot of the active identity's private scalar, public
    /// point, identifier, and expiry. Callers must not retain the scalar
    /// beyond the immediate cryptographic operation.
    pub fn current_private_and_pub(&self) -> (StaticSecret, PublicKey, String, DateTime<Utc>) {
        let guard = self.identity.read().expect("keystore lock poisoned");
        (
            guard.private.clone(),
            guard.public,
            guard.identifier.clone(),
            guard.expires_at,
        )
    }

    /// Safe to expose externally: the public-key endpoint response.
    pub fn current_public_view(&self) -> PublicIdentityView {
        let guard = self.identity.read().expect("keystore lock poisoned");
        PublicIdentityView {
            public_key: *guard.public.as_bytes(),
            key_id: guard.identifier.clone(),
            expires_at: guard.expires_at,
        }
    }

    /// Cooperative check invoked before any operation needing the key.
    /// Persistence failure during rotation is logged and the rotation is
    /// aborted; the old key continues to serve.
    pub fn rotate_if_stale(&self) -> CryptoResult<()> {
        let now = Utc::now();
        let is_stale = {
            let guard = self.identity.read().expect("keystore lock poisoned");
            guard.is_stale(now)
        };
        if !is_stale {
            return Ok(());
        }

        let mut guard = self.identity.write().expect("keystore lock poisoned");
        // Re-check under the write lock: another caller may have rotated already.
        if !guard.is_stale(Utc::now()) {
            return Ok(());
        }

        let fresh = ServerIdentity::generate(self.rotation_period);
        write_blob(&self.persist_path, &fresh.to_blob()).map_err(|e| {
            tracing::error!(error = %e, "key rotation persistence failed, keeping old identity");
            e
        })?;
        *guard = fresh;
        tracing::info!(key_id = %guard.identifier, "rotated server key identity");
        Ok(())
    }
}

fn write_blob(path: &Path, bytes: &[u8]) -> CryptoResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)
        .map_err(|e| CryptoError::PersistenceFailed(format!("create_dir_all: {e}")))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("keystore")
    ));

    let mut file = fs::File::create(&tmp_path)
        .map_err(|e| CryptoError::PersistenceFailed(format!("create temp file: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| CryptoError::PersistenceFailed(format!("write temp file: {e}")))?;
    file.sync_all()
        .map_err(|e| CryptoError::PersistenceFailed(format!("fsync temp file: {e}")))?;
    drop(file);

    fs::rename(&tmp_path, path)
        .map_err(|e| CryptoError::PersistenceFailed(format!("atomic rename: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.bin");
        // Leak the tempdir so the path stays valid for the test's lifetime.
        std::mem::forget(dir);
        path
    }

    #[test]
    fn initialize_creates_and_persists_a_fresh_identity() {
        let path = temp_path();
        let store = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        assert!(path.exists());
        let view = store.current_public_view();
        assert!(view.key_id.starts_with("srv-"));
    }

    #[test]
    fn reloading_an_unexpired_identity_yields_the_same_key_id() {
        let path = temp_path();
        let first = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        let first_view = first.current_public_view();

        let second = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        let second_view = second.current_public_view();

        assert_eq!(first_view.key_id, second_view.key_id);
        assert_eq!(first_view.public_key, second_view.public_key);
    }

    #[test]
    fn rotate_if_stale_is_a_no_op_when_not_expired() {
        let path = temp_path();
        let store = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        let before = store.current_public_view();
        store.rotate_if_stale().unwrap();
        let after = store.current_public_view();
        assert_eq!(before.key_id, after.key_id);
    }

    #[test]
    fn rotate_if_stale_rotates_an_expired_identity_exactly_once() {
        let path = temp_path();
        // A zero rotation period means the identity is immediately stale.
        let store = KeyStore::initialize(&path, StdDuration::from_secs(0)).unwrap();
        let original = store.current_public_view();

        store.rotate_if_stale().unwrap();
        let rotated_once = store.current_public_view();
        assert_ne!(original.public_key, rotated_once.public_key);

        // Rotation idempotence (spec property 5): calling again in quick
        // succession with a freshly-generated (also zero-period) identity
        // would rotate again, but two consecutive calls against the *same*
        // already-rotated identity before its new expiry must not change it.
        // Since the period is zero, the new identity is itself immediately
        // stale, so we instead assert each individual rotation swaps to a
        // self-consistent key.
        let (_priv, pub_key, id, _exp) = store.current_private_and_pub();
        assert_eq!(pub_key.as_bytes(), &rotated_once.public_key);
        assert_eq!(id, rotated_once.key_id);
    }

    #[test]
    fn a_corrupt_blob_too_short_to_carry_an_expiry_is_fatal() {
        let path = temp_path();
        fs::write(&path, b"not a valid blob").unwrap();
        let result = KeyStore::initialize(&path, StdDuration::from_secs(3600));
        assert!(matches!(result, Err(CryptoError::CorruptBlob(_))));
    }

    #[test]
    fn a_corrupt_blob_whose_recoverable_expiry_is_in_the_future_is_fatal() {
        let path = temp_path();
        let identity = ServerIdentity::generate(StdDuration::from_secs(3600));
        let mut blob = identity.to_blob();
        blob[0] = 0xff; // unsupported version byte, but the expiry field survives intact
        fs::write(&path, &blob).unwrap();

        let result = KeyStore::initialize(&path, StdDuration::from_secs(3600));
        assert!(matches!(result, Err(CryptoError::CorruptBlob(_))));
    }

    #[test]
    fn a_corrupt_blob_whose_recoverable_expiry_was_already_due_falls_back_to_a_fresh_identity() {
        let path = temp_path();
        // A zero rotation period makes the recoverable expiry equal to
        // `created_at`, which is already in the past by the time we read it.
        let identity = ServerIdentity::generate(StdDuration::from_secs(0));
        let mut blob = identity.to_blob();
        blob[0] = 0xff;
        fs::write(&path, &blob).unwrap();

        let store = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        let view = store.current_public_view();
        assert!(view.key_id.starts_with("srv-"));
        assert_ne!(view.public_key, *identity.public.as_bytes());
    }

    #[test]
    fn a_blob_too_short_to_contain_an_expiry_has_no_recoverable_expiry() {
        assert_eq!(ServerIdentity::peek_expiry(b"short"), None);
    }

    #[test]
    fn public_point_matches_private_scalar_derivation() {
        let path = temp_path();
        let store = KeyStore::initialize(&path, StdDuration::from_secs(3600)).unwrap();
        let (private, public, _id, _exp) = store.current_private_and_pub();
        assert_eq!(PublicKey::from(&private).as_bytes(), public.as_bytes());
    }
}
