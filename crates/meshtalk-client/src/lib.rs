//! MeshTalk client core — the end-to-end encrypted session engine.
//!
//! This crate orchestrates `meshtalk-crypto` and `meshtalk-protocol` into a
//! per-peer session state machine over a duplex WebSocket transport:
//! identity restore, directory key exchange, session key derivation, and
//! authenticated encryption of every message payload. Plaintext is handed
//! only to the injected [`sink::MessageSink`]; it never crosses the
//! transport.
//!
//! All collaborators (vault, directory, sink) are injected at construction
//! so lifetimes and test doubles stay explicit — there is no ambient global
//! state.

pub mod config;
pub mod directory;
pub mod error;
pub mod registration;
pub mod session;
pub mod sink;

pub use config::ClientConfig;
pub use directory::{Directory, DirectoryError, HttpDirectory, RegisterAck, StubDirectory};
pub use error::{ClientError, TransportError};
pub use registration::{local_user_id, register_identity};
pub use session::{PeerPhase, SessionHandle, SessionManager, SessionState};
pub use sink::{MemorySink, MessageSink, StoredMessage};
