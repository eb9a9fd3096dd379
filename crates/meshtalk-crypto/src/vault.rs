//! Secure-storage vault abstraction.
//!
//! The vault is an opaque account → secret-bytes store. Implementations must
//! overwrite on put and must keep "not found" (`Ok(None)`) distinct from
//! backend failures (`Err`).

use std::collections::HashMap;
use std::sync::Mutex;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secure storage failure: {0}")]
    Backend(String),
}

/// Opaque get/put/delete store for secret bytes.
pub trait SecretVault: Send + Sync {
    /// Store `secret` under `account`, replacing any existing entry.
    fn put(&self, account: &str, secret: &[u8]) -> Result<(), VaultError>;

    /// Fetch the secret stored under `account`. `Ok(None)` means no entry
    /// exists — a normal outcome, not an error.
    fn get(&self, account: &str) -> Result<Option<Vec<u8>>, VaultError>;

    /// Remove the entry under `account`. Removing a missing entry succeeds;
    /// a backend failure must be reported, not swallowed.
    fn delete(&self, account: &str) -> Result<(), VaultError>;
}

/// System keychain vault backed by the `keyring` crate.
///
/// The keyring API is string-valued, so secrets are wrapped in base64 for
/// storage.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, account: &str) -> Result<keyring::Entry, VaultError> {
        keyring::Entry::new(&self.service, account)
            .map_err(|e| VaultError::Backend(e.to_string()))
    }
}

impl SecretVault for KeyringVault {
    fn put(&self, account: &str, secret: &[u8]) -> Result<(), VaultError> {
        self.entry(account)?
            .set_password(&BASE64.encode(secret))
            .map_err(|e| VaultError::Backend(e.to_string()))
    }

    fn get(&self, account: &str) -> Result<Option<Vec<u8>>, VaultError> {
        match self.entry(account)?.get_password() {
            Ok(encoded) => BASE64
                .decode(encoded)
                .map(Some)
                .map_err(|_| VaultError::Backend("stored secret is not valid base64".into())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Backend(e.to_string())),
        }
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        match self.entry(account)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::Backend(e.to_string())),
        }
    }
}

/// In-memory vault for tests and demos.
#[derive(Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretVault for MemoryVault {
    fn put(&self, account: &str, secret: &[u8]) -> Result<(), VaultError> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(account.to_string(), secret.to_vec());
        Ok(())
    }

    fn get(&self, account: &str) -> Result<Option<Vec<u8>>, VaultError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(account)
            .cloned())
    }

    fn delete(&self, account: &str) -> Result<(), VaultError> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(account);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_vault_roundtrip() {
        let vault = MemoryVault::new();
        assert!(vault.get("k").unwrap().is_none());

        vault.put("k", b"secret").unwrap();
        assert_eq!(vault.get("k").unwrap().as_deref(), Some(&b"secret"[..]));

        // Put replaces, never appends.
        vault.put("k", b"other").unwrap();
        assert_eq!(vault.get("k").unwrap().as_deref(), Some(&b"other"[..]));

        vault.delete("k").unwrap();
        assert!(vault.get("k").unwrap().is_none());
    }

    #[test]
    fn memory_vault_delete_missing_is_ok() {
        let vault = MemoryVault::new();
        assert!(vault.delete("missing").is_ok());
    }
}
