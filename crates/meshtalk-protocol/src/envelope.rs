use uuid::Uuid;

use crate::wire::MessageKind;

/// A decoded envelope — one logical send/receive event.
///
/// Immutable once constructed. The payload is whatever bytes the sender put
/// in; for `MessageKind::Text` that is AES-GCM combined ciphertext, but the
/// protocol layer treats it as opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub id: Uuid,
    pub kind: MessageKind,
    /// Unix timestamp in seconds, set by the sender.
    pub timestamp: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Build a text envelope with a fresh random id.
    pub fn text(
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        payload: Vec<u8>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: MessageKind::Text,
            timestamp,
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            payload,
        }
    }
}
