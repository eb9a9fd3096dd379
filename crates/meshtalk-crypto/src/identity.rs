//! Long-term identity key pairs.
//!
//! Each device has one X25519 key pair generated on first registration and
//! persisted across restarts. The public half is published to the directory;
//! the private half never leaves the vault.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

/// X25519 key length in bytes, for both halves of the pair.
pub const KEY_LEN: usize = 32;

/// The device's long-term asymmetric identity.
///
/// The private scalar is zeroized on drop by `StaticSecret` itself.
#[derive(Clone)]
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity from the system CSPRNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Reconstruct an identity from stored private key bytes.
    ///
    /// X25519 clamps the scalar internally, so any 32 bytes form a usable
    /// secret; length is the only validity check callers need.
    pub fn from_bytes(secret_bytes: [u8; KEY_LEN]) -> Self {
        let secret = StaticSecret::from(secret_bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public key bytes, as published to the directory.
    pub fn public_bytes(&self) -> [u8; KEY_LEN] {
        *self.public.as_bytes()
    }

    /// Private key bytes, for vault persistence only.
    pub fn secret_bytes(&self) -> [u8; KEY_LEN] {
        self.secret.to_bytes()
    }

    /// Perform X25519 Diffie-Hellman with a peer's public key.
    pub fn diffie_hellman(&self, peer_public: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(peer_public)
    }
}

impl std::fmt::Debug for IdentityKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret half.
        f.debug_struct("IdentityKeyPair")
            .field("public", &self.public_bytes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_roundtrip() {
        let pair = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_bytes(pair.secret_bytes());
        assert_eq!(pair.public_bytes(), restored.public_bytes());
    }

    #[test]
    fn distinct_identities() {
        let a = IdentityKeyPair::generate();
        let b = IdentityKeyPair::generate();
        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn debug_hides_secret() {
        let pair = IdentityKeyPair::generate();
        let printed = format!("{pair:?}");
        let secret_hex: String = pair
            .secret_bytes()
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        assert!(!printed.contains(&secret_hex));
    }
}
