use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Client configuration.
///
/// Deserializable from JSON with every field optional, falling back to the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the directory HTTP service.
    pub directory_url: String,
    /// WebSocket URL of the message relay. The local user id is appended as
    /// a `userID` query parameter on connect.
    pub transport_url: String,
    /// Vault account name for the identity private key.
    pub key_account: String,
    /// Vault account name for the directory-assigned user id.
    pub user_account: String,
    /// Directory lookup + key derivation deadline during handshake.
    pub handshake_timeout_secs: u64,
    /// Transport open deadline.
    pub connect_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            directory_url: "http://127.0.0.1:8080".into(),
            transport_url: "ws://127.0.0.1:8080/ws".into(),
            key_account: "meshtalk_identity_v1".into(),
            user_account: "meshtalk_user_id_v1".into(),
            handshake_timeout_secs: 10,
            connect_timeout_secs: 10,
        }
    }
}

impl ClientConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"transport_url": "ws://example.net/ws"}"#).unwrap();
        assert_eq!(config.transport_url, "ws://example.net/ws");
        assert_eq!(config.key_account, "meshtalk_identity_v1");
        assert_eq!(config.handshake_timeout(), Duration::from_secs(10));
    }
}
