//! Error types for Bellhop core

use thiserror::Error;

/// Errors related to node identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Node identifier is empty")]
    Empty,

    #[error("Node identifier {id:?} is longer than {max} characters")]
    TooLong { id: String, max: usize },

    #[error("Node identifier {0:?} contains a character that is not ASCII alphanumeric")]
    InvalidCharacter(String),

    #[error("Node identifier {0:?} starts with '0'")]
    LeadingZero(String),
}

/// Errors raised while decoding a packet from its wire form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unknown protocol tag: {0:?}")]
    UnknownProtocolTag(char),

    #[error("Packet truncated: {actual} bytes, header needs {expected}")]
    Truncated { expected: usize, actual: usize },

    #[error("Invalid destination field: {0}")]
    InvalidDestination(#[from] IdentityError),
}

/// Errors raised by link queues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("Queue receiver disconnected")]
    Disconnected,
}

impl QueueError {
    /// True when the error means "no room right now"
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }
}
