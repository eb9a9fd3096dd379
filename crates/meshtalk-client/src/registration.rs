//! Registration flow — the one place a new identity is minted.
//!
//! Restores the persisted identity if one exists, otherwise creates and
//! persists a fresh key pair, then publishes the public half to the
//! directory. The directory-assigned user id is stored in the vault next to
//! the key and later embedded in the transport URL.

use std::sync::Arc;

use tracing::info;

use meshtalk_crypto::{IdentityKeyStore, SecretVault};

use crate::config::ClientConfig;
use crate::directory::{Directory, RegisterAck};
use crate::error::ClientError;

/// Register this device with the directory under `username`.
///
/// Reuses the persisted identity when present — registration never silently
/// replaces an existing key pair.
pub async fn register_identity(
    vault: Arc<dyn SecretVault>,
    directory: &dyn Directory,
    config: &ClientConfig,
    username: &str,
) -> Result<RegisterAck, ClientError> {
    let mut store = IdentityKeyStore::new(vault.clone(), &config.key_account);
    let public = match store.load()? {
        Some(identity) => identity.public_bytes(),
        None => store.create_and_persist()?.public_bytes(),
    };

    let ack = directory.register(username, &public).await?;
    vault.put(&config.user_account, ack.user_id.as_bytes())?;
    info!(user_id = %ack.user_id, "directory registration complete");
    Ok(ack)
}

/// The directory-assigned id of this device, if registered.
pub fn local_user_id(
    vault: &dyn SecretVault,
    config: &ClientConfig,
) -> Result<Option<String>, ClientError> {
    match vault.get(&config.user_account)? {
        Some(bytes) => String::from_utf8(bytes)
            .map(Some)
            .map_err(|_| ClientError::NotRegistered),
        None => Ok(None),
    }
}
