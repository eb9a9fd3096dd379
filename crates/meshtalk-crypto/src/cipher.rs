//! AES-256-GCM payload encryption in combined form.
//!
//! Combined form is `nonce(12) || ciphertext || tag(16)` — one opaque byte
//! string per message. The nonce is drawn fresh from the system CSPRNG on
//! every call; it is the only per-message freshness in the protocol, so
//! nothing else may generate it.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

use crate::session::SessionKey;

/// AES-GCM nonce size.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag size.
pub const TAG_LEN: usize = 16;

/// Smallest possible combined form: nonce + tag around an empty plaintext.
pub const MIN_COMBINED_LEN: usize = NONCE_LEN + TAG_LEN;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("authentication failed: wrong key or tampered ciphertext")]
    AuthenticationFailed,

    #[error("malformed ciphertext: {got} bytes (min {MIN_COMBINED_LEN})")]
    MalformedCiphertext { got: usize },

    #[error("payload too large to seal")]
    SealFailed,

    #[error("system RNG failure")]
    Rng,
}

fn aead_key(key: &SessionKey) -> LessSafeKey {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes()).expect("valid key length");
    LessSafeKey::new(unbound)
}

/// Encrypt a payload under a session key.
///
/// Returns the combined form. Each call draws a fresh random nonce.
pub fn encrypt(plaintext: &[u8], key: &SessionKey) -> Result<Vec<u8>, CipherError> {
    let rng = SystemRandom::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill(&mut nonce_bytes).map_err(|_| CipherError::Rng)?;

    let mut in_out = plaintext.to_vec();
    aead_key(key)
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| CipherError::SealFailed)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + in_out.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&in_out);
    Ok(combined)
}

/// Decrypt a combined-form ciphertext under a session key.
///
/// Fails with `MalformedCiphertext` when the input cannot even contain a
/// nonce and tag, and `AuthenticationFailed` when the tag does not verify.
/// Never returns partial plaintext.
pub fn decrypt(combined: &[u8], key: &SessionKey) -> Result<Vec<u8>, CipherError> {
    if combined.len() < MIN_COMBINED_LEN {
        return Err(CipherError::MalformedCiphertext {
            got: combined.len(),
        });
    }

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&combined[..NONCE_LEN]);

    let mut in_out = combined[NONCE_LEN..].to_vec();
    let plaintext = aead_key(key)
        .open_in_place(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut in_out)
        .map_err(|_| CipherError::AuthenticationFailed)?;

    Ok(plaintext.to_vec())
}
