//! Bounded FIFO link queues
//!
//! A [`LinkQueue`] is the physical medium between two network elements. It
//! wraps a tokio `mpsc` channel and keeps both halves, so any party holding
//! a reference can enqueue or dequeue: the owning node reads its inbound
//! queue and writes its outbound queue, while the link does the opposite.
//!
//! Dequeuing never suspends. Enqueuing either fails fast with
//! [`QueueError::Full`] or waits for room, optionally bounded by a timeout.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::error::QueueError;

/// How many items a queue may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueCapacity {
    /// No limit; puts never fail
    #[default]
    Unbounded,
    /// At most this many queued items
    Bounded(NonZeroUsize),
}

impl QueueCapacity {
    /// Bounded capacity, or `None` when `n` is zero
    pub fn bounded(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Self::Bounded)
    }

    /// Interpret an optional maximum size (`None` means unbounded)
    pub fn from_max_size(max: Option<NonZeroUsize>) -> Self {
        match max {
            Some(n) => Self::Bounded(n),
            None => Self::Unbounded,
        }
    }

    /// The limit, if any
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(n) => Some(n.get()),
        }
    }
}

impl fmt::Display for QueueCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("unbounded"),
            Self::Bounded(n) => write!(f, "{}", n),
        }
    }
}

/// How a put behaves when the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutMode {
    /// Fail immediately with [`QueueError::Full`]
    NonBlocking,
    /// Wait for room; `None` waits indefinitely
    Blocking { timeout: Option<Duration> },
}

enum QueueSender {
    Bounded(mpsc::Sender<Vec<u8>>),
    Unbounded(mpsc::UnboundedSender<Vec<u8>>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<Vec<u8>>),
    Unbounded(mpsc::UnboundedReceiver<Vec<u8>>),
}

impl QueueReceiver {
    fn try_recv(&mut self) -> Result<Vec<u8>, TryRecvError> {
        match self {
            Self::Bounded(rx) => rx.try_recv(),
            Self::Unbounded(rx) => rx.try_recv(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Bounded(rx) => rx.len(),
            Self::Unbounded(rx) => rx.len(),
        }
    }
}

/// A thread-safe FIFO of encoded packets
pub struct LinkQueue {
    capacity: QueueCapacity,
    tx: QueueSender,
    rx: Mutex<QueueReceiver>,
}

impl LinkQueue {
    /// Create a queue with the given capacity
    pub fn new(capacity: QueueCapacity) -> Self {
        let (tx, rx) = match capacity {
            QueueCapacity::Unbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                (QueueSender::Unbounded(tx), QueueReceiver::Unbounded(rx))
            }
            QueueCapacity::Bounded(n) => {
                let (tx, rx) = mpsc::channel(n.get());
                (QueueSender::Bounded(tx), QueueReceiver::Bounded(rx))
            }
        };
        Self {
            capacity,
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Create an unbounded queue
    pub fn unbounded() -> Self {
        Self::new(QueueCapacity::Unbounded)
    }

    /// The configured capacity
    pub fn capacity(&self) -> QueueCapacity {
        self.capacity
    }

    /// Enqueue without waiting
    pub fn try_put(&self, item: Vec<u8>) -> Result<(), QueueError> {
        match &self.tx {
            QueueSender::Unbounded(tx) => tx.send(item).map_err(|_| QueueError::Disconnected),
            QueueSender::Bounded(tx) => tx.try_send(item).map_err(|e| match e {
                TrySendError::Full(_) => QueueError::Full {
                    capacity: tx.max_capacity(),
                },
                TrySendError::Closed(_) => QueueError::Disconnected,
            }),
        }
    }

    /// Enqueue, waiting for room up to `timeout`
    ///
    /// Timeout expiry is reported as [`QueueError::Full`].
    pub async fn put_blocking(
        &self,
        item: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<(), QueueError> {
        let tx = match &self.tx {
            QueueSender::Unbounded(tx) => {
                return tx.send(item).map_err(|_| QueueError::Disconnected);
            }
            QueueSender::Bounded(tx) => tx,
        };

        match timeout {
            None => tx.send(item).await.map_err(|_| QueueError::Disconnected),
            Some(limit) => match tokio::time::timeout(limit, tx.send(item)).await {
                Ok(sent) => sent.map_err(|_| QueueError::Disconnected),
                Err(_) => Err(QueueError::Full {
                    capacity: tx.max_capacity(),
                }),
            },
        }
    }

    /// Enqueue using the given mode
    pub async fn put(&self, item: Vec<u8>, mode: PutMode) -> Result<(), QueueError> {
        match mode {
            PutMode::NonBlocking => self.try_put(item),
            PutMode::Blocking { timeout } => self.put_blocking(item, timeout).await,
        }
    }

    /// Dequeue the oldest item, or `None` if the queue is empty
    pub fn get(&self) -> Option<Vec<u8>> {
        // The queue owns its sender, so the channel cannot be disconnected
        self.rx.lock().try_recv().ok()
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.rx.lock().len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LinkQueue {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Debug for LinkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
