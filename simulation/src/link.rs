//! Links between node interfaces
//!
//! A [`Link`] joins two interfaces. Each transmit moves at most one packet
//! in each direction, from one side's outbound queue to the other side's
//! inbound queue. A packet that finds the inbound queue full is dropped.
//!
//! The [`LinkLayer`] runs every link of a network from a single task.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bellhop_core::{DEFAULT_IDLE_BACKOFF, Direction, Interface, Node, NodeId};
use serde::Serialize;
use tracing::{trace, warn};

/// One side of a link
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub node: NodeId,
    pub port: usize,
    pub interface: Arc<Interface>,
}

impl Endpoint {
    pub fn new(node: NodeId, port: usize, interface: Arc<Interface>) -> Self {
        Self {
            node,
            port,
            interface,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.port)
    }
}

/// Result of one transmit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transfer {
    pub moved: u64,
    pub dropped: u64,
}

impl Transfer {
    pub fn is_idle(&self) -> bool {
        self.moved == 0 && self.dropped == 0
    }
}

/// A bidirectional link between two interfaces
#[derive(Debug, Clone)]
pub struct Link {
    a: Endpoint,
    b: Endpoint,
}

impl Link {
    pub fn new(a: Endpoint, b: Endpoint) -> Self {
        Self { a, b }
    }

    pub fn endpoints(&self) -> (&Endpoint, &Endpoint) {
        (&self.a, &self.b)
    }

    fn carry(from: &Endpoint, to: &Endpoint, transfer: &mut Transfer) {
        let Some(bytes) = from.interface.get(Direction::Out) else {
            return;
        };
        let len = bytes.len();
        match to.interface.try_put(bytes, Direction::In) {
            Ok(()) => {
                transfer.moved += 1;
                trace!(from = %from, to = %to, len, "Packet carried");
            }
            Err(e) => {
                transfer.dropped += 1;
                warn!(from = %from, to = %to, error = %e, "Packet lost on link");
            }
        }
    }

    /// Move at most one packet each way
    pub fn transmit(&self) -> Transfer {
        let mut transfer = Transfer::default();
        Self::carry(&self.a, &self.b, &mut transfer);
        Self::carry(&self.b, &self.a, &mut transfer);
        transfer
    }

    /// Check if neither side has packets waiting in either direction
    pub fn is_idle(&self) -> bool {
        self.a.interface.is_idle() && self.b.interface.is_idle()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// Totals shared between the link layer task and observers
#[derive(Debug, Default)]
pub struct LinkCounters {
    moved: AtomicU64,
    dropped: AtomicU64,
}

impl LinkCounters {
    fn record(&self, transfer: Transfer) {
        self.moved.fetch_add(transfer.moved, Ordering::Relaxed);
        self.dropped.fetch_add(transfer.dropped, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            moved: self.moved.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Link layer totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub moved: u64,
    pub dropped: u64,
}

impl LinkStats {
    /// Every packet the links have handled, delivered or not
    pub fn activity(&self) -> u64 {
        self.moved + self.dropped
    }
}

/// Configuration for the link layer
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub idle_backoff: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

impl LinkConfig {
    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }
}

/// Every link of a network, driven from one task
pub struct LinkLayer {
    links: Vec<Link>,
    counters: Arc<LinkCounters>,
    config: LinkConfig,
}

impl LinkLayer {
    pub fn new(links: Vec<Link>, config: LinkConfig) -> Self {
        Self {
            links,
            counters: Arc::new(LinkCounters::default()),
            config,
        }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Counters that stay readable while the layer runs
    pub fn counters(&self) -> Arc<LinkCounters> {
        Arc::clone(&self.counters)
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    /// Transmit once on every link
    pub fn transmit_all(&self) -> Transfer {
        let mut total = Transfer::default();
        for link in &self.links {
            let transfer = link.transmit();
            total.moved += transfer.moved;
            total.dropped += transfer.dropped;
        }
        self.counters.record(total);
        total
    }
}

impl fmt::Debug for LinkLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkLayer")
            .field("links", &self.links.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl Node for LinkLayer {
    fn name(&self) -> String {
        "links".to_string()
    }

    async fn step(&mut self) -> usize {
        let transfer = self.transmit_all();
        (transfer.moved + transfer.dropped) as usize
    }

    fn idle_backoff(&self) -> Duration {
        self.config.idle_backoff
    }
}
