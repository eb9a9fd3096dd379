use thiserror::Error;

use meshtalk_crypto::{CipherError, IdentityError, KeyExchangeError, VaultError};
use meshtalk_protocol::ProtocolError;

use crate::directory::DirectoryError;

/// Transport-level failures. Fatal to the current connection but always
/// recoverable by reconnecting.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("connection closed: {0}")]
    Closed(String),
}

/// Errors surfaced by the session manager.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no local identity — register one first")]
    NoIdentity,

    #[error("no directory registration — register one first")]
    NotRegistered,

    #[error("session not ready — handshake pending, retry the send")]
    SessionNotReady,

    #[error("not connected")]
    NotConnected,

    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    KeyExchange(#[from] KeyExchangeError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
