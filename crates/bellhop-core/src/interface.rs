//! Network interfaces
//!
//! An [`Interface`] pairs an inbound and an outbound [`LinkQueue`]. A node
//! reads `In` and writes `Out`; the link attached to the interface reads
//! `Out` and writes `In`. Interfaces are shared as `Arc<Interface>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::QueueError;
use crate::queue::{LinkQueue, PutMode, QueueCapacity};

/// Which queue of an interface to address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Toward the owning node
    In,
    /// Away from the owning node
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => f.write_str("in"),
            Self::Out => f.write_str("out"),
        }
    }
}

/// A pair of link queues owned by one node
#[derive(Debug)]
pub struct Interface {
    inbound: LinkQueue,
    outbound: LinkQueue,
}

impl Interface {
    /// Create an interface whose queues share one capacity
    pub fn new(capacity: QueueCapacity) -> Self {
        Self {
            inbound: LinkQueue::new(capacity),
            outbound: LinkQueue::new(capacity),
        }
    }

    /// The queue for a direction
    pub fn queue(&self, direction: Direction) -> &LinkQueue {
        match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        }
    }

    /// Enqueue on one side without waiting
    pub fn try_put(&self, item: Vec<u8>, direction: Direction) -> Result<(), QueueError> {
        self.queue(direction).try_put(item)
    }

    /// Enqueue on one side using the given mode
    pub async fn put(
        &self,
        item: Vec<u8>,
        direction: Direction,
        mode: PutMode,
    ) -> Result<(), QueueError> {
        self.queue(direction).put(item, mode).await
    }

    /// Dequeue from one side without waiting
    pub fn get(&self, direction: Direction) -> Option<Vec<u8>> {
        self.queue(direction).get()
    }

    /// Items waiting on one side
    pub fn len(&self, direction: Direction) -> usize {
        self.queue(direction).len()
    }

    /// Check if one side is empty
    pub fn is_empty(&self, direction: Direction) -> bool {
        self.queue(direction).is_empty()
    }

    /// Check if both sides are drained
    pub fn is_idle(&self) -> bool {
        self.inbound.is_empty() && self.outbound.is_empty()
    }
}

impl Default for Interface {
    fn default() -> Self {
        Self::new(QueueCapacity::Unbounded)
    }
}
