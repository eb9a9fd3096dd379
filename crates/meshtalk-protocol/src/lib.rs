//! MeshTalk wire protocol — the binary envelope exchanged between peers.
//!
//! Envelopes are protobuf-encoded records carrying routing metadata in the
//! clear and an opaque payload. For text messages the payload is ciphertext
//! produced by `meshtalk-crypto`; this crate never inspects or decrypts it.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod wire;

pub use codec::{decode, encode, MAX_FRAME_SIZE};
pub use envelope::Envelope;
pub use error::ProtocolError;
pub use wire::MessageKind;
