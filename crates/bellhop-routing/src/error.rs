//! Routing error types
//!
//! Wraps the core codec and queue errors and adds the failures of the
//! forwarding and route-update paths.

use bellhop_core::{CodecError, NodeId, PacketKind, QueueError};
use thiserror::Error;

use crate::cost::Cost;

/// Errors raised by the router engine
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Packet could not be decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Queue operation failed
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// Destination has never been learned
    #[error("Unknown destination: {0}")]
    UnknownDestination(NodeId),

    /// Destination is known but no neighbor offers a finite path
    #[error("No route to {0}")]
    NoRoute(NodeId),

    /// Data packet addressed to the link-local broadcast destination
    #[error("Data packet addressed to broadcast cannot be routed")]
    UnroutableBroadcast,

    /// Control payload is not a valid route advertisement
    #[error("Malformed route advertisement: {0}")]
    MalformedAdvert(String),

    /// Link cost outside the accepted range
    #[error("Invalid cost {cost} for link to {neighbor}")]
    InvalidCost { neighbor: NodeId, cost: Cost },

    /// Interface index out of range
    #[error("No interface with index {0}")]
    NoSuchInterface(usize),

    /// Packet kind the engine does not handle
    #[error("Internal invariant violated: unhandled packet kind {0}")]
    InternalInvariantViolation(PacketKind),
}

impl From<serde_json::Error> for RoutingError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedAdvert(err.to_string())
    }
}

impl RoutingError {
    /// Check if this error means the packet was dropped on a full queue
    pub fn is_queue_full(&self) -> bool {
        matches!(self, Self::Queue(e) if e.is_full())
    }
}

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;
