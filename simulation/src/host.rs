//! Hosts: the endpoints that produce and consume data packets
//!
//! A host has a single interface (port 0). Sending wraps a payload in a
//! Data packet and enqueues it outbound; receiving polls the inbound queue
//! and records the payloads of Data packets. Control packets reach hosts
//! because routers advertise on every connected port; they are ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bellhop_core::{
    DEFAULT_IDLE_BACKOFF, Direction, Interface, NetworkPacket, Node, NodeId, PacketKind, PutMode,
    QueueCapacity,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SimResult;

/// Configuration for a host
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub queue_capacity: QueueCapacity,
    /// How long a send waits for room; `None` waits forever
    pub put_timeout: Option<Duration>,
    pub idle_backoff: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            queue_capacity: QueueCapacity::Unbounded,
            put_timeout: Some(Duration::from_millis(100)),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }
}

impl HostConfig {
    pub fn with_queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_put_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.put_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }
}

/// Packet counters for one host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub sent: u64,
    pub received: u64,
    /// Control packets seen and discarded
    pub ignored: u64,
    /// Packets that failed to decode
    pub malformed: u64,
}

/// Sending half of a host, usable while the host loop owns the host
#[derive(Debug, Clone)]
pub struct HostSender {
    addr: NodeId,
    interface: Arc<Interface>,
    mode: PutMode,
    sent: Arc<AtomicU64>,
}

impl HostSender {
    pub fn addr(&self) -> &NodeId {
        &self.addr
    }

    /// Enqueue a data packet for `destination`
    pub async fn send(&self, destination: NodeId, payload: impl Into<Vec<u8>>) -> SimResult<()> {
        let packet = NetworkPacket::data(destination, payload);
        self.interface
            .put(packet.to_bytes(), Direction::Out, self.mode)
            .await?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(host = %self.addr, %packet, "Sending packet");
        Ok(())
    }
}

/// What one poll of the inbound queue produced
enum Arrival {
    Data(Vec<u8>),
    Ignored,
}

/// A network endpoint
pub struct Host {
    addr: NodeId,
    interface: Arc<Interface>,
    config: HostConfig,
    inbox: Vec<Vec<u8>>,
    sent: Arc<AtomicU64>,
    stats: HostStats,
}

impl Host {
    pub fn new(addr: NodeId, config: HostConfig) -> Self {
        Self {
            interface: Arc::new(Interface::new(config.queue_capacity)),
            addr,
            config,
            inbox: Vec::new(),
            sent: Arc::new(AtomicU64::new(0)),
            stats: HostStats::default(),
        }
    }

    pub fn addr(&self) -> &NodeId {
        &self.addr
    }

    /// The host's only interface
    pub fn interface(&self) -> &Arc<Interface> {
        &self.interface
    }

    /// Payloads received so far, oldest first
    pub fn inbox(&self) -> &[Vec<u8>] {
        &self.inbox
    }

    pub fn stats(&self) -> HostStats {
        HostStats {
            sent: self.sent.load(Ordering::Relaxed),
            ..self.stats
        }
    }

    /// A handle for sending from outside the host loop
    pub fn sender(&self) -> HostSender {
        HostSender {
            addr: self.addr.clone(),
            interface: Arc::clone(&self.interface),
            mode: PutMode::Blocking {
                timeout: self.config.put_timeout,
            },
            sent: Arc::clone(&self.sent),
        }
    }

    /// Enqueue a data packet for `destination`
    pub async fn send(&self, destination: NodeId, payload: impl Into<Vec<u8>>) -> SimResult<()> {
        self.sender().send(destination, payload).await
    }

    fn poll(&mut self) -> Option<Arrival> {
        let bytes = self.interface.get(Direction::In)?;
        let packet = match NetworkPacket::from_bytes(&bytes) {
            Ok(packet) => packet,
            Err(e) => {
                self.stats.malformed += 1;
                warn!(host = %self.addr, error = %e, "Discarding undecodable packet");
                return Some(Arrival::Ignored);
            }
        };

        match packet.kind {
            PacketKind::Data => {
                self.stats.received += 1;
                info!(host = %self.addr, %packet, "Received packet");
                self.inbox.push(packet.payload.clone());
                Some(Arrival::Data(packet.payload))
            }
            _ => {
                self.stats.ignored += 1;
                debug!(host = %self.addr, kind = %packet.kind, "Ignoring non-data packet");
                Some(Arrival::Ignored)
            }
        }
    }

    /// Take one packet off the inbound queue and return its payload if it
    /// carried data
    pub fn receive(&mut self) -> Option<Vec<u8>> {
        match self.poll()? {
            Arrival::Data(payload) => Some(payload),
            Arrival::Ignored => None,
        }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("addr", &self.addr)
            .field("inbox", &self.inbox.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl Node for Host {
    fn name(&self) -> String {
        self.addr.to_string()
    }

    async fn step(&mut self) -> usize {
        usize::from(self.poll().is_some())
    }

    fn idle_backoff(&self) -> Duration {
        self.config.idle_backoff
    }
}
