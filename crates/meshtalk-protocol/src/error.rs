use thiserror::Error;

use crate::codec::MAX_FRAME_SIZE;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] prost::DecodeError),

    #[error("invalid envelope id: {0}")]
    InvalidId(#[from] uuid::Error),

    #[error("unknown message kind: {0}")]
    UnknownKind(i32),

    #[error("frame too large: {0} bytes (max {MAX_FRAME_SIZE})")]
    FrameTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_display() {
        let e = ProtocolError::UnknownKind(9);
        assert!(e.to_string().contains('9'));
    }

    #[test]
    fn frame_too_large_display() {
        let e = ProtocolError::FrameTooLarge(100_000);
        let msg = e.to_string();
        assert!(msg.contains("100000"));
        assert!(msg.contains("65536"));
    }
}
