//! The router engine
//!
//! A [`Router`] owns one [`Interface`] per port, a static [`CostTable`] and
//! its [`RoutingTable`]. Each loop iteration polls every inbound queue once,
//! in port order, and dispatches what it finds:
//!
//! - **Data** packets are forwarded toward their destination
//! - **Control** packets carry a neighbor's table and drive the
//!   distance-vector update
//!
//! Per-packet failures are logged and counted as drops; they never stop the
//! router.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bellhop_core::{
    Destination, Direction, Interface, NetworkPacket, Node, NodeId, PacketKind, PutMode,
};
use serde::Serialize;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::advert::RouteAdvert;
use crate::config::{AdvertisePolicy, RouterConfig};
use crate::cost::CostTable;
use crate::error::{RoutingError, RoutingResult};
use crate::table::RoutingTable;

/// Packet counters for one router
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Packets taken off inbound queues
    pub received: u64,
    /// Data packets passed to a next hop
    pub forwarded: u64,
    /// Data packets addressed to this router
    pub delivered: u64,
    /// Packets lost to errors or full queues
    pub dropped: u64,
    /// The part of `dropped` lost to a full outbound queue
    pub queue_full: u64,
    pub adverts_received: u64,
    pub adverts_sent: u64,
    /// Entries of the routing table that improved
    pub improvements: u64,
}

/// A distance-vector router
pub struct Router {
    name: NodeId,
    interfaces: Vec<Arc<Interface>>,
    costs: CostTable,
    table: RoutingTable,
    config: RouterConfig,
    stats: RouterStats,
    advert_pending: bool,
    last_advert: Option<Instant>,
}

impl Router {
    /// Create a router with one interface per port named in `costs`
    pub fn new(name: NodeId, costs: CostTable, config: RouterConfig) -> Self {
        let interfaces = (0..costs.interface_count())
            .map(|_| Arc::new(Interface::new(config.queue_capacity)))
            .collect();
        let table = RoutingTable::seeded(name.clone(), &costs);

        info!(router = %name, neighbors = costs.len(), "Router created");

        Self {
            name,
            interfaces,
            costs,
            table,
            config,
            stats: RouterStats::default(),
            advert_pending: false,
            last_advert: None,
        }
    }

    pub fn name(&self) -> &NodeId {
        &self.name
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn stats(&self) -> RouterStats {
        self.stats
    }

    /// Interface at port `index`
    pub fn interface(&self, index: usize) -> RoutingResult<&Arc<Interface>> {
        self.interfaces
            .get(index)
            .ok_or(RoutingError::NoSuchInterface(index))
    }

    pub fn interfaces(&self) -> &[Arc<Interface>] {
        &self.interfaces
    }

    fn blocking_put(&self) -> PutMode {
        PutMode::Blocking {
            timeout: self.config.put_timeout,
        }
    }

    /// Poll each inbound queue once and handle what arrived
    ///
    /// Returns the number of packets taken off queues.
    pub async fn process_queues(&mut self) -> usize {
        let mut handled = 0;

        for index in 0..self.interfaces.len() {
            let Some(bytes) = self.interfaces[index].get(Direction::In) else {
                continue;
            };
            handled += 1;
            self.stats.received += 1;

            match self.handle(&bytes, index).await {
                Ok(()) => {}
                Err(RoutingError::InternalInvariantViolation(kind)) => {
                    error!(router = %self.name, interface = index, %kind, "Unhandled packet kind, abandoning iteration");
                    self.stats.dropped += 1;
                    break;
                }
                Err(e) if e.is_queue_full() => {
                    warn!(router = %self.name, interface = index, error = %e, "Outbound queue full, packet dropped");
                    self.stats.dropped += 1;
                    self.stats.queue_full += 1;
                }
                Err(e) => {
                    warn!(router = %self.name, interface = index, error = %e, "Packet dropped");
                    self.stats.dropped += 1;
                }
            }
        }

        if self.advert_pending && self.readvertise_due() {
            self.broadcast_routes().await;
        }

        handled
    }

    async fn handle(&mut self, bytes: &[u8], index: usize) -> RoutingResult<()> {
        let packet = NetworkPacket::from_bytes(bytes)?;
        match packet.kind {
            PacketKind::Data => self.forward_packet(packet, index).await,
            PacketKind::Control => self.update_routes(&packet, index).await,
            other => Err(RoutingError::InternalInvariantViolation(other)),
        }
    }

    /// Pick the neighbor that should carry traffic for `destination`
    pub fn next_hop(&self, destination: &NodeId) -> RoutingResult<NodeId> {
        if self.costs.is_neighbor(destination) {
            return Ok(destination.clone());
        }
        self.table.next_hop(destination, &self.costs)
    }

    /// Forward a data packet that arrived on interface `from`
    pub async fn forward_packet(&mut self, packet: NetworkPacket, from: usize) -> RoutingResult<()> {
        let destination = match &packet.destination {
            Destination::Node(id) => id.clone(),
            Destination::Broadcast => return Err(RoutingError::UnroutableBroadcast),
        };

        if destination == self.name {
            self.stats.delivered += 1;
            info!(router = %self.name, interface = from, %packet, "Packet delivered locally");
            return Ok(());
        }

        let next_hop = self.next_hop(&destination)?;
        let link = self
            .costs
            .link(&next_hop)
            .ok_or_else(|| RoutingError::NoRoute(destination.clone()))?;
        let out = Arc::clone(self.interface(link.interface)?);

        out.put(packet.to_bytes(), Direction::Out, self.blocking_put())
            .await?;
        self.stats.forwarded += 1;
        debug!(
            router = %self.name,
            %packet,
            from,
            to = link.interface,
            next_hop = %next_hop,
            "Forwarded packet"
        );
        Ok(())
    }

    /// Send the full routing table out of interface `index`
    ///
    /// A full queue drops the advertisement.
    pub async fn send_routes(&mut self, index: usize) -> RoutingResult<()> {
        let out = Arc::clone(self.interface(index)?);
        let packet = RouteAdvert::from_table(&self.table).to_packet()?;

        match out
            .put(packet.to_bytes(), Direction::Out, self.blocking_put())
            .await
        {
            Ok(()) => {
                self.stats.adverts_sent += 1;
                debug!(router = %self.name, interface = index, "Sent routing update");
            }
            Err(e) => {
                self.stats.dropped += 1;
                warn!(router = %self.name, interface = index, error = %e, "Routing update lost");
            }
        }
        Ok(())
    }

    /// Advertise on every connected interface; returns adverts enqueued
    pub async fn broadcast_routes(&mut self) -> usize {
        let ports: BTreeSet<usize> = self.costs.links().map(|(_, port, _)| port).collect();
        let before = self.stats.adverts_sent;

        for port in ports {
            if let Err(e) = self.send_routes(port).await {
                warn!(router = %self.name, interface = port, error = %e, "Routing update not sent");
            }
        }

        self.advert_pending = false;
        self.last_advert = Some(Instant::now());
        (self.stats.adverts_sent - before) as usize
    }

    fn readvertise_due(&self) -> bool {
        match (self.config.readvertise_interval, self.last_advert) {
            (Some(interval), Some(last)) => last.elapsed() >= interval,
            _ => true,
        }
    }

    async fn advertise(&mut self) {
        if self.readvertise_due() {
            self.broadcast_routes().await;
        } else {
            self.advert_pending = true;
        }
    }

    /// Merge a neighbor's advertisement and re-advertise on improvement
    pub async fn update_routes(&mut self, packet: &NetworkPacket, from: usize) -> RoutingResult<()> {
        let advert = RouteAdvert::from_payload(&packet.payload)?;
        if advert.advertiser == self.name {
            return Err(RoutingError::MalformedAdvert(format!(
                "advert claims to come from {}",
                self.name
            )));
        }
        self.stats.adverts_received += 1;

        self.table.import(&advert);
        let improvements = self.table.relax();
        debug!(
            router = %self.name,
            advertiser = %advert.advertiser,
            interface = from,
            improved = improvements.len(),
            "Received routing update"
        );

        if improvements.is_empty() {
            return Ok(());
        }
        self.stats.improvements += improvements.len() as u64;
        for improvement in &improvements {
            debug!(
                router = %self.name,
                destination = %improvement.destination,
                via = %improvement.via,
                old = improvement.old,
                new = improvement.new,
                "Route improved"
            );
        }

        match self.config.advertise_policy {
            AdvertisePolicy::EveryImprovement => {
                for _ in &improvements {
                    self.advertise().await;
                }
            }
            AdvertisePolicy::OncePerUpdate => self.advertise().await,
        }
        Ok(())
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("interfaces", &self.interfaces.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[async_trait]
impl Node for Router {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn on_start(&mut self) {
        info!(router = %self.name, "Initialized routing table\n{}", self.table);
        if self.config.advertise_on_start {
            self.broadcast_routes().await;
        }
    }

    async fn step(&mut self) -> usize {
        self.process_queues().await
    }

    fn idle_backoff(&self) -> Duration {
        self.config.idle_backoff
    }
}
