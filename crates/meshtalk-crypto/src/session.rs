//! Session key derivation.
//!
//! One static symmetric key per identity pair: X25519 Diffie-Hellman over
//! the two identities, stretched through HKDF-SHA256 with empty salt and
//! empty info. Both sides derive the identical key, and it stays the same
//! until either identity changes — there is no per-session randomness and
//! no ratchet.

use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::PublicKey;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::identity::{IdentityKeyPair, KEY_LEN};

#[derive(Debug, Error)]
pub enum KeyExchangeError {
    #[error("peer public key is not a valid X25519 key")]
    InvalidPeerKey,

    #[error("no local identity — load or create one first")]
    NoLocalIdentity,
}

/// 256-bit symmetric session key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Derive the symmetric session key shared with a peer.
///
/// `peer_public` must be exactly 32 bytes. Low-order peer keys that would
/// collapse the shared secret to zero are rejected — that is the X25519
/// equivalent of an off-curve point.
pub fn derive_session_key(
    local: &IdentityKeyPair,
    peer_public: &[u8],
) -> Result<SessionKey, KeyExchangeError> {
    let peer_bytes: [u8; KEY_LEN] = peer_public
        .try_into()
        .map_err(|_| KeyExchangeError::InvalidPeerKey)?;

    let shared = local.diffie_hellman(&PublicKey::from(peer_bytes));
    if !shared.was_contributory() {
        return Err(KeyExchangeError::InvalidPeerKey);
    }

    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut okm = [0u8; KEY_LEN];
    hk.expand(&[], &mut okm)
        .unwrap(); // Output size matches digest size, infallible

    Ok(SessionKey(okm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_agreement_is_symmetric() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();

        let s1 = derive_session_key(&alice, &bob.public_bytes()).unwrap();
        let s2 = derive_session_key(&bob, &alice.public_bytes()).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn derivation_is_deterministic() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();

        let s1 = derive_session_key(&alice, &bob.public_bytes()).unwrap();
        let s2 = derive_session_key(&alice, &bob.public_bytes()).unwrap();
        assert_eq!(s1, s2);
    }

    #[test]
    fn different_peers_yield_different_keys() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let carol = IdentityKeyPair::generate();

        let with_bob = derive_session_key(&alice, &bob.public_bytes()).unwrap();
        let with_carol = derive_session_key(&alice, &carol.public_bytes()).unwrap();
        assert_ne!(with_bob, with_carol);
    }

    #[test]
    fn wrong_length_peer_key_is_rejected() {
        let alice = IdentityKeyPair::generate();
        for len in [0, 16, 31, 33, 64] {
            let bad = vec![0x42u8; len];
            assert!(matches!(
                derive_session_key(&alice, &bad),
                Err(KeyExchangeError::InvalidPeerKey)
            ));
        }
    }

    #[test]
    fn low_order_peer_key_is_rejected() {
        let alice = IdentityKeyPair::generate();
        // The identity point: DH with it yields an all-zero shared secret.
        let zero = [0u8; 32];
        assert!(matches!(
            derive_session_key(&alice, &zero),
            Err(KeyExchangeError::InvalidPeerKey)
        ));
    }
}
