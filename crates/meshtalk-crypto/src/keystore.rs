//! Identity key lifecycle: load, create, and destroy the device identity.
//!
//! The store never creates a key on its own — restoring an existing identity
//! and minting a new one are separate, explicit operations, because silently
//! regenerating on boot would orphan every prior conversation.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::identity::{IdentityKeyPair, KEY_LEN};
use crate::vault::{SecretVault, VaultError};

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The vault holds an entry that is not valid key material. Distinct
    /// from "absent" so callers cannot mistake a damaged key for a fresh
    /// device.
    #[error("stored identity key is corrupt: expected {KEY_LEN} bytes, got {got}")]
    CorruptStoredKey { got: usize },

    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Owns the device's long-term identity and its persisted copy.
pub struct IdentityKeyStore {
    vault: Arc<dyn SecretVault>,
    account: String,
    current: Option<IdentityKeyPair>,
}

impl IdentityKeyStore {
    pub fn new(vault: Arc<dyn SecretVault>, account: impl Into<String>) -> Self {
        Self {
            vault,
            account: account.into(),
            current: None,
        }
    }

    /// The identity currently held in memory, if any.
    pub fn identity(&self) -> Option<&IdentityKeyPair> {
        self.current.as_ref()
    }

    /// Restore the persisted identity from the vault.
    ///
    /// `Ok(None)` when no entry exists — the normal first-run outcome.
    /// A present-but-invalid entry is reported as `CorruptStoredKey`.
    pub fn load(&mut self) -> Result<Option<&IdentityKeyPair>, IdentityError> {
        let Some(bytes) = self.vault.get(&self.account)? else {
            return Ok(None);
        };

        let secret: [u8; KEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentityError::CorruptStoredKey { got: bytes.len() })?;

        self.current = Some(IdentityKeyPair::from_bytes(secret));
        info!("identity restored from vault");
        Ok(self.current.as_ref())
    }

    /// Generate a fresh identity and persist it, superseding any prior one.
    ///
    /// Only the explicit registration flow reaches this; calling it on every
    /// boot would destroy identity continuity.
    pub fn create_and_persist(&mut self) -> Result<&IdentityKeyPair, IdentityError> {
        let pair = IdentityKeyPair::generate();
        self.vault.put(&self.account, &pair.secret_bytes())?;
        info!("new identity created and persisted");
        Ok(self.current.insert(pair))
    }

    /// Destroy the identity: delete the vault entry and drop the in-memory
    /// copy. Irreversible. A vault deletion failure is returned without
    /// dropping the key — a stale key surviving logout must be visible.
    pub fn clear(&mut self) -> Result<(), IdentityError> {
        if let Err(e) = self.vault.delete(&self.account) {
            warn!("identity deletion failed: {e}");
            return Err(e.into());
        }
        self.current = None;
        info!("identity cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::MemoryVault;

    fn store(vault: &Arc<MemoryVault>) -> IdentityKeyStore {
        IdentityKeyStore::new(vault.clone() as Arc<dyn SecretVault>, "test_identity")
    }

    #[test]
    fn load_absent_returns_none() {
        let vault = Arc::new(MemoryVault::new());
        let mut s = store(&vault);
        assert!(s.load().unwrap().is_none());
        assert!(s.identity().is_none());
    }

    #[test]
    fn persisted_identity_survives_restart() {
        let vault = Arc::new(MemoryVault::new());
        let public = {
            let mut s = store(&vault);
            s.create_and_persist().unwrap().public_bytes()
        };

        // Fresh store over the same vault simulates a process restart.
        let mut s = store(&vault);
        let restored = s.load().unwrap().expect("identity should persist");
        assert_eq!(restored.public_bytes(), public);
    }

    #[test]
    fn create_supersedes_previous_identity() {
        let vault = Arc::new(MemoryVault::new());
        let mut s = store(&vault);
        let first = s.create_and_persist().unwrap().public_bytes();
        let second = s.create_and_persist().unwrap().public_bytes();
        assert_ne!(first, second);

        let mut s2 = store(&vault);
        assert_eq!(s2.load().unwrap().unwrap().public_bytes(), second);
    }

    #[test]
    fn corrupt_entry_is_not_treated_as_absent() {
        let vault = Arc::new(MemoryVault::new());
        vault.put("test_identity", &[0xAB; 16]).unwrap();

        let mut s = store(&vault);
        match s.load() {
            Err(IdentityError::CorruptStoredKey { got: 16 }) => {}
            other => panic!("expected CorruptStoredKey, got {other:?}"),
        }
        assert!(s.identity().is_none());
    }

    #[test]
    fn clear_removes_key_everywhere() {
        let vault = Arc::new(MemoryVault::new());
        let mut s = store(&vault);
        s.create_and_persist().unwrap();
        s.clear().unwrap();
        assert!(s.identity().is_none());
        assert!(vault.get("test_identity").unwrap().is_none());
        assert!(s.load().unwrap().is_none());
    }

    #[test]
    fn clear_reports_vault_failure() {
        struct FailingVault;
        impl SecretVault for FailingVault {
            fn put(&self, _: &str, _: &[u8]) -> Result<(), VaultError> {
                Ok(())
            }
            fn get(&self, _: &str) -> Result<Option<Vec<u8>>, VaultError> {
                Ok(None)
            }
            fn delete(&self, _: &str) -> Result<(), VaultError> {
                Err(VaultError::Backend("keychain locked".into()))
            }
        }

        let mut s = IdentityKeyStore::new(Arc::new(FailingVault), "acct");
        s.create_and_persist().unwrap();
        assert!(s.clear().is_err());
        // The in-memory identity must survive a failed deletion so the
        // caller can retry.
        assert!(s.identity().is_some());
    }
}
