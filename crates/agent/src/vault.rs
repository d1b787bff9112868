//! Agent keypair persistence (§4.4: "On first start the agent generates an
//! Ed25519 keypair, persists it (Base64), and uses it for SynAck/DataAck
//! signing forever").
//!
//! The real secret store (an OS keychain, a sealed file, a KMS) is out of
//! scope; `KeyVault` is the boundary the agent binary programs against, with
//! an in-memory implementation for tests and a plain JSON-file implementation
//! for local/dev use (no passphrase-encryption layer, unlike the teacher's
//! `GuardianContainer` — see DESIGN.md).

use mrzap_crypto::keys::Ed25519KeyPair;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors persisting or loading the agent's signing identity.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The backing file could not be read or written.
    #[error("vault I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored JSON was malformed.
    #[error("malformed vault contents: {0}")]
    Malformed(String),
    /// The stored key material was not a valid Ed25519 seed.
    #[error("invalid stored key material: {0}")]
    InvalidKey(#[from] mrzap_crypto::CryptoError),
}

impl mrzap_types::ErrorCode for VaultError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "VAULT_IO_ERROR",
            Self::Malformed(_) => "VAULT_MALFORMED",
            Self::InvalidKey(_) => "VAULT_INVALID_KEY",
        }
    }
}

/// Persists and retrieves the agent's one long-lived signing identity.
pub trait KeyVault: Send + Sync {
    /// Loads the persisted keypair, if one exists.
    fn load(&self) -> Result<Option<Ed25519KeyPair>, VaultError>;
    /// Persists `key_pair`, overwriting whatever was previously stored.
    fn save(&self, key_pair: &Ed25519KeyPair) -> Result<(), VaultError>;

    /// Loads the persisted keypair, generating and persisting a fresh one on
    /// first run.
    fn load_or_generate(&self) -> Result<Ed25519KeyPair, VaultError> {
        if let Some(existing) = self.load()? {
            return Ok(existing);
        }
        let fresh = Ed25519KeyPair::generate();
        self.save(&fresh)?;
        Ok(fresh)
    }
}

/// A `KeyVault` that never touches disk — for tests and single-process demos.
#[derive(Default)]
pub struct InMemoryKeyVault {
    stored: std::sync::Mutex<Option<String>>,
}

impl KeyVault for InMemoryKeyVault {
    fn load(&self) -> Result<Option<Ed25519KeyPair>, VaultError> {
        match self.stored.lock().unwrap().as_deref() {
            Some(seed) => Ok(Some(Ed25519KeyPair::from_base64_seed(seed)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key_pair: &Ed25519KeyPair) -> Result<(), VaultError> {
        *self.stored.lock().unwrap() = Some(key_pair.to_base64_seed());
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedKey {
    /// Base64-encoded Ed25519 public key.
    public_key: String,
    /// Base64-encoded 32-byte Ed25519 seed.
    private_key: String,
}

/// A `KeyVault` backed by a single JSON file on disk, for local/dev use.
pub struct JsonFileKeyVault {
    path: PathBuf,
}

impl JsonFileKeyVault {
    /// Points the vault at `path`; the file is created on first `save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyVault for JsonFileKeyVault {
    fn load(&self) -> Result<Option<Ed25519KeyPair>, VaultError> {
        if !Path::new(&self.path).exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let persisted: PersistedKey = serde_json::from_str(&raw).map_err(|e| VaultError::Malformed(e.to_string()))?;
        let key_pair = Ed25519KeyPair::from_base64_seed(&persisted.private_key)?;
        if key_pair.public_key().to_base64() != persisted.public_key {
            return Err(VaultError::Malformed("stored publicKey does not match privateKey".to_string()));
        }
        Ok(Some(key_pair))
    }

    fn save(&self, key_pair: &Ed25519KeyPair) -> Result<(), VaultError> {
        let persisted = PersistedKey {
            public_key: key_pair.public_key().to_base64(),
            private_key: key_pair.to_base64_seed(),
        };
        let raw = serde_json::to_string_pretty(&persisted).map_err(|e| VaultError::Malformed(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_vault_generates_once_then_returns_the_same_key() {
        let vault = InMemoryKeyVault::default();
        let first = vault.load_or_generate().unwrap();
        let second = vault.load_or_generate().unwrap();
        assert_eq!(first.public_key().to_base64(), second.public_key().to_base64());
    }

    #[test]
    fn json_file_vault_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("mrzap-vault-test-{:?}", std::thread::current().id()));
        let path = dir.join("identity.json");
        let vault = JsonFileKeyVault::new(&path);
        let generated = vault.load_or_generate().unwrap();
        let reloaded = JsonFileKeyVault::new(&path).load().unwrap().expect("key persisted");
        assert_eq!(generated.public_key().to_base64(), reloaded.public_key().to_base64());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
