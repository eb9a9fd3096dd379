//! MeshTalk cryptographic layer — identity keys, session derivation, and
//! payload encryption.
//!
//! This crate provides:
//! - Long-term X25519 identity key pairs, persisted through a pluggable
//!   secure-storage vault
//! - Static session key derivation (X25519 Diffie-Hellman + HKDF-SHA256)
//! - AES-256-GCM authenticated encryption of message payloads in combined
//!   form (nonce || ciphertext || tag)
//!
//! There is no ratcheting: one session key per identity pair, valid until
//! either side's identity changes.

pub mod cipher;
pub mod identity;
pub mod keystore;
pub mod session;
pub mod vault;

pub use cipher::{decrypt, encrypt, CipherError};
pub use identity::IdentityKeyPair;
pub use keystore::{IdentityError, IdentityKeyStore};
pub use session::{derive_session_key, KeyExchangeError, SessionKey};
pub use vault::{KeyringVault, MemoryVault, SecretVault, VaultError};
