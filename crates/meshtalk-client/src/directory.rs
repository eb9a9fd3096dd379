//! Directory client — publishes the local public key and resolves peers'.
//!
//! The directory is the single source of truth for key distribution. No
//! pinning or out-of-band fingerprint check happens here; length and format
//! are the only validation applied to fetched keys.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// X25519 public key length expected from the directory.
const PUBLIC_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory rejected the request as malformed")]
    BadRequest,

    #[error("directory rejected the request: status {0}")]
    ServerRejected(u16),

    #[error("no key published for '{0}'")]
    NotFound(String),

    #[error("directory unreachable: {0}")]
    TransportFailure(String),

    #[error("malformed directory response: {0}")]
    MalformedResponse(String),
}

/// Acknowledgment returned by a successful registration.
#[derive(Debug, Clone)]
pub struct RegisterAck {
    pub status: String,
    /// Server-assigned opaque identifier for this identity.
    pub user_id: String,
}

/// Key publication and lookup.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Publish `public_key` under a user-visible `username`. The directory
    /// assigns and returns the opaque id used for routing and lookups.
    async fn register(
        &self,
        username: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<RegisterAck, DirectoryError>;

    /// Resolve a peer's published public key by id.
    async fn fetch_public_key(
        &self,
        peer_id: &str,
    ) -> Result<[u8; PUBLIC_KEY_LEN], DirectoryError>;
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    public_key: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    status: String,
    user_id: String,
}

#[derive(Deserialize)]
struct KeyResponse {
    #[allow(dead_code)]
    user_id: String,
    public_key: String,
}

/// HTTP directory client.
#[derive(Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| DirectoryError::TransportFailure(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    async fn register(
        &self,
        username: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<RegisterAck, DirectoryError> {
        let body = RegisterRequest {
            username,
            public_key: BASE64.encode(public_key),
        };

        let resp = self
            .client
            .post(format!("{}/register", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| DirectoryError::TransportFailure(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => {
                let parsed: RegisterResponse = resp
                    .json()
                    .await
                    .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))?;
                info!(user_id = %parsed.user_id, "registered with directory");
                Ok(RegisterAck {
                    status: parsed.status,
                    user_id: parsed.user_id,
                })
            }
            StatusCode::BAD_REQUEST => Err(DirectoryError::BadRequest),
            other => Err(DirectoryError::ServerRejected(other.as_u16())),
        }
    }

    async fn fetch_public_key(
        &self,
        peer_id: &str,
    ) -> Result<[u8; PUBLIC_KEY_LEN], DirectoryError> {
        let resp = self
            .client
            .get(format!("{}/keys/{}", self.base_url, peer_id))
            .send()
            .await
            .map_err(|e| DirectoryError::TransportFailure(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => {
                let parsed: KeyResponse = resp
                    .json()
                    .await
                    .map_err(|e| DirectoryError::MalformedResponse(e.to_string()))?;
                decode_public_key(&parsed.public_key)
            }
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound(peer_id.to_string())),
            other => Err(DirectoryError::ServerRejected(other.as_u16())),
        }
    }
}

/// Decode a base64 public key and check its length.
fn decode_public_key(encoded: &str) -> Result<[u8; PUBLIC_KEY_LEN], DirectoryError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| DirectoryError::MalformedResponse(format!("bad base64 key: {e}")))?;
    bytes.as_slice().try_into().map_err(|_| {
        DirectoryError::MalformedResponse(format!(
            "key length {} (expected {PUBLIC_KEY_LEN})",
            bytes.len()
        ))
    })
}

/// In-memory directory for tests and demos. Assigns sequential ids
/// (`u1`, `u2`, …) on registration.
#[derive(Default)]
pub struct StubDirectory {
    inner: Mutex<StubState>,
}

#[derive(Default)]
struct StubState {
    next_id: u32,
    keys: HashMap<String, [u8; PUBLIC_KEY_LEN]>,
}

#[async_trait]
impl Directory for StubDirectory {
    async fn register(
        &self,
        _username: &str,
        public_key: &[u8; PUBLIC_KEY_LEN],
    ) -> Result<RegisterAck, DirectoryError> {
        let mut state = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        state.next_id += 1;
        let user_id = format!("u{}", state.next_id);
        state.keys.insert(user_id.clone(), *public_key);
        Ok(RegisterAck {
            status: "created".into(),
            user_id,
        })
    }

    async fn fetch_public_key(
        &self,
        peer_id: &str,
    ) -> Result<[u8; PUBLIC_KEY_LEN], DirectoryError> {
        let state = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        state
            .keys
            .get(peer_id)
            .copied()
            .ok_or_else(|| DirectoryError::NotFound(peer_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_uses_wire_field_names() {
        let body = RegisterRequest {
            username: "alice",
            public_key: BASE64.encode([1u8; 32]),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("username").is_some());
        assert!(json.get("public_key").is_some());
    }

    #[test]
    fn key_response_parses_wire_field_names() {
        let json = format!(
            r#"{{"user_id": "u1", "public_key": "{}"}}"#,
            BASE64.encode([9u8; 32])
        );
        let parsed: KeyResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(decode_public_key(&parsed.public_key).unwrap(), [9u8; 32]);
    }

    #[test]
    fn short_key_is_malformed() {
        let encoded = BASE64.encode([1u8; 16]);
        assert!(matches!(
            decode_public_key(&encoded),
            Err(DirectoryError::MalformedResponse(_))
        ));
    }

    #[test]
    fn garbage_base64_is_malformed() {
        assert!(matches!(
            decode_public_key("not base64 !!!"),
            Err(DirectoryError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn stub_directory_assigns_sequential_ids() {
        let dir = StubDirectory::default();
        let a = dir.register("alice", &[1u8; 32]).await.unwrap();
        let b = dir.register("bob", &[2u8; 32]).await.unwrap();
        assert_eq!(a.user_id, "u1");
        assert_eq!(b.user_id, "u2");

        assert_eq!(dir.fetch_public_key("u2").await.unwrap(), [2u8; 32]);
        assert!(matches!(
            dir.fetch_public_key("u9").await,
            Err(DirectoryError::NotFound(_))
        ));
    }
}
