//! Protobuf schema for the on-wire envelope.
//!
//! The message layout is the bit-exact contract both peers and the relay
//! server share. Field numbers are frozen; add new fields, never renumber.

use prost::Message;

/// On-wire envelope record. `payload` is an opaque byte string — ciphertext
/// for text messages.
#[derive(Clone, PartialEq, Message)]
pub struct WireEnvelope {
    #[prost(enumeration = "MessageKind", tag = "1")]
    pub kind: i32,
    /// UUID string identifying this envelope.
    #[prost(string, tag = "2")]
    pub id: String,
    /// Unix timestamp in seconds.
    #[prost(int64, tag = "3")]
    pub timestamp: i64,
    #[prost(string, tag = "4")]
    pub sender_id: String,
    #[prost(string, tag = "5")]
    pub recipient_id: String,
    #[prost(bytes = "vec", tag = "6")]
    pub payload: Vec<u8>,
}

/// Kind of traffic an envelope carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageKind {
    /// Reserved zero value — rejected by the codec.
    Unspecified = 0,
    /// Encrypted text message.
    Text = 1,
}
