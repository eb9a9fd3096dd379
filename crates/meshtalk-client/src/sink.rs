//! Message history sink — the append-only record store collaborator.
//!
//! The core writes one record per successful send or decrypt and never
//! reads them back.

use std::sync::Mutex;

/// One chat history record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub text: String,
    pub outgoing: bool,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

/// Fire-and-forget append sink.
pub trait MessageSink: Send + Sync {
    fn insert(&self, text: &str, outgoing: bool, timestamp: i64);
}

/// In-memory sink for tests and demos.
#[derive(Default)]
pub struct MemorySink {
    messages: Mutex<Vec<StoredMessage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything inserted so far, in order.
    pub fn messages(&self) -> Vec<StoredMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

impl MessageSink for MemorySink {
    fn insert(&self, text: &str, outgoing: bool, timestamp: i64) {
        self.messages
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(StoredMessage {
                text: text.to_string(),
                outgoing,
                timestamp,
            });
    }
}
