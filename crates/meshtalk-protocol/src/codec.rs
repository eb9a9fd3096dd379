use prost::Message;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::wire::{MessageKind, WireEnvelope};

/// Maximum encoded envelope size: 64 KiB.
pub const MAX_FRAME_SIZE: usize = 65_536;

/// Encode an envelope into protobuf bytes ready for one transport frame.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
    let wire = WireEnvelope {
        kind: envelope.kind as i32,
        id: envelope.id.to_string(),
        timestamp: envelope.timestamp,
        sender_id: envelope.sender_id.clone(),
        recipient_id: envelope.recipient_id.clone(),
        payload: envelope.payload.clone(),
    };
    let bytes = wire.encode_to_vec();
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(bytes.len()));
    }
    Ok(bytes)
}

/// Decode one frame into an envelope.
///
/// Rejects truncated input, oversized frames, unparsable ids, and
/// envelopes whose kind tag is unknown or unset — never guesses a default.
pub fn decode(bytes: &[u8]) -> Result<Envelope, ProtocolError> {
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(bytes.len()));
    }

    let wire = WireEnvelope::decode(bytes)?;

    let kind = MessageKind::try_from(wire.kind)
        .map_err(|_| ProtocolError::UnknownKind(wire.kind))?;
    if kind == MessageKind::Unspecified {
        return Err(ProtocolError::UnknownKind(wire.kind));
    }

    Ok(Envelope {
        id: Uuid::parse_str(&wire.id)?,
        kind,
        timestamp: wire.timestamp,
        sender_id: wire.sender_id,
        recipient_id: wire.recipient_id,
        payload: wire.payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope::text("u1", "u2", vec![0xDE, 0xAD, 0xBE, 0xEF], 1_700_000_000)
    }

    #[test]
    fn roundtrip() {
        let envelope = sample();
        let bytes = encode(&envelope).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn payload_is_opaque() {
        // Arbitrary non-UTF-8 payload bytes survive untouched.
        let mut envelope = sample();
        envelope.payload = (0..=255u8).collect();
        let decoded = decode(&encode(&envelope).unwrap()).unwrap();
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = encode(&sample()).unwrap();
        // These cut points all land mid-field (inside the id string or the
        // payload), so decode must report a malformed envelope.
        for cut in [1, 5, bytes.len() / 2, bytes.len() - 1] {
            assert!(decode(&bytes[..cut]).is_err(), "cut at {cut} decoded");
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        // An empty buffer decodes to an all-default WireEnvelope, which must
        // be rejected for its unset kind — not returned as partial data.
        assert!(matches!(decode(&[]), Err(ProtocolError::UnknownKind(0))));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut envelope = sample();
        let wire = WireEnvelope {
            kind: 42,
            id: envelope.id.to_string(),
            timestamp: envelope.timestamp,
            sender_id: std::mem::take(&mut envelope.sender_id),
            recipient_id: std::mem::take(&mut envelope.recipient_id),
            payload: std::mem::take(&mut envelope.payload),
        };
        let bytes = wire.encode_to_vec();
        assert!(matches!(decode(&bytes), Err(ProtocolError::UnknownKind(42))));
    }

    #[test]
    fn unspecified_kind_is_rejected() {
        let wire = WireEnvelope {
            kind: 0,
            id: Uuid::new_v4().to_string(),
            timestamp: 1,
            sender_id: "u1".into(),
            recipient_id: "u2".into(),
            payload: vec![],
        };
        assert!(matches!(
            decode(&wire.encode_to_vec()),
            Err(ProtocolError::UnknownKind(0))
        ));
    }

    #[test]
    fn bad_id_is_rejected() {
        let wire = WireEnvelope {
            kind: MessageKind::Text as i32,
            id: "not-a-uuid".into(),
            timestamp: 1,
            sender_id: "u1".into(),
            recipient_id: "u2".into(),
            payload: vec![],
        };
        assert!(matches!(
            decode(&wire.encode_to_vec()),
            Err(ProtocolError::InvalidId(_))
        ));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let mut envelope = sample();
        envelope.payload = vec![0u8; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            encode(&envelope),
            Err(ProtocolError::FrameTooLarge(_))
        ));
    }
}
