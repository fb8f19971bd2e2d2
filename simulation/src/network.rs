//! Wiring a topology into running nodes
//!
//! [`Network::from_config`] creates every router, host and link described by
//! a [`TopologyConfig`]. [`Network::start`] spawns one task per router and
//! host plus one for the link layer, all sharing a single stop signal.
//! Shutting a [`RunningNetwork`] down returns the stopped nodes in a
//! [`NetworkReport`] for inspection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bellhop_core::{Interface, NodeHandle, NodeId, StopSignal, spawn_with};
use bellhop_routing::{Cost, INFINITY, Router, RouterStats};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, SimResult, SimulationError};
use crate::host::{Host, HostSender, HostStats};
use crate::link::{Endpoint, Link, LinkCounters, LinkLayer, LinkStats};
use crate::topology::{HOST_PORT, TopologyConfig};

/// Shortest path costs keyed by router, then destination
pub type PathCosts = BTreeMap<NodeId, BTreeMap<NodeId, Cost>>;

/// A fully wired network that has not started yet
#[derive(Debug)]
pub struct Network {
    routers: Vec<Router>,
    hosts: Vec<Host>,
    links: LinkLayer,
    expected: PathCosts,
}

impl Network {
    /// Build every node and link of `config`
    pub fn from_config(config: &TopologyConfig) -> SimResult<Self> {
        config.validate()?;

        let router_config = config.settings.router_config()?;
        let host_config = config.settings.host_config()?;

        let routers: Vec<Router> = config
            .cost_tables()?
            .into_iter()
            .map(|(name, costs)| Router::new(name, costs, router_config.clone()))
            .collect();
        let hosts: Vec<Host> = config
            .hosts
            .iter()
            .map(|h| Host::new(h.name.clone(), host_config.clone()))
            .collect();

        let mut ports: BTreeMap<(NodeId, usize), Arc<Interface>> = BTreeMap::new();
        for router in &routers {
            for (port, interface) in router.interfaces().iter().enumerate() {
                ports.insert((router.name().clone(), port), Arc::clone(interface));
            }
        }
        for host in &hosts {
            ports.insert((host.addr().clone(), HOST_PORT), Arc::clone(host.interface()));
        }

        let endpoint = |node: &NodeId, port: usize| -> SimResult<Endpoint> {
            let interface = ports.get(&(node.clone(), port)).ok_or_else(|| {
                ConfigError::NoSuchInterface {
                    node: node.clone(),
                    interface: port,
                }
            })?;
            Ok(Endpoint::new(node.clone(), port, Arc::clone(interface)))
        };
        let links = config
            .links
            .iter()
            .map(|l| Ok(Link::new(endpoint(&l.a, l.a_interface)?, endpoint(&l.b, l.b_interface)?)))
            .collect::<SimResult<Vec<_>>>()?;

        info!(
            routers = routers.len(),
            hosts = hosts.len(),
            links = links.len(),
            "Network wired"
        );

        Ok(Self {
            routers,
            hosts,
            links: LinkLayer::new(links, config.settings.link_config()),
            expected: config.shortest_paths(),
        })
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn links(&self) -> &LinkLayer {
        &self.links
    }

    /// Shortest path costs every router should converge to
    pub fn expected_costs(&self) -> &PathCosts {
        &self.expected
    }

    /// Spawn every node; must be called within a Tokio runtime
    pub fn start(self) -> RunningNetwork {
        let stop = StopSignal::new();

        let mut interfaces: Vec<Arc<Interface>> = self
            .routers
            .iter()
            .flat_map(|r| r.interfaces().iter().cloned())
            .collect();
        interfaces.extend(self.hosts.iter().map(|h| Arc::clone(h.interface())));

        let senders = self
            .hosts
            .iter()
            .map(|h| (h.addr().clone(), h.sender()))
            .collect();
        let counters = self.links.counters();

        let links = spawn_with(self.links, stop.clone());
        let routers = self
            .routers
            .into_iter()
            .map(|r| spawn_with(r, stop.clone()))
            .collect();
        let hosts = self
            .hosts
            .into_iter()
            .map(|h| spawn_with(h, stop.clone()))
            .collect();

        info!("Network started");
        RunningNetwork {
            stop,
            routers,
            hosts,
            links,
            senders,
            interfaces,
            counters,
            expected: self.expected,
        }
    }
}

/// Handles to the tasks of a started network
pub struct RunningNetwork {
    stop: StopSignal,
    routers: Vec<NodeHandle<Router>>,
    hosts: Vec<NodeHandle<Host>>,
    links: NodeHandle<LinkLayer>,
    senders: BTreeMap<NodeId, HostSender>,
    interfaces: Vec<Arc<Interface>>,
    counters: Arc<LinkCounters>,
    expected: PathCosts,
}

impl RunningNetwork {
    /// Send a data packet from host `from` to `to`
    pub async fn send(
        &self,
        from: &NodeId,
        to: &NodeId,
        payload: impl Into<Vec<u8>>,
    ) -> SimResult<()> {
        let sender = self
            .senders
            .get(from)
            .ok_or_else(|| SimulationError::UnknownHost(from.clone()))?;
        sender.send(to.clone(), payload).await
    }

    /// Link totals so far
    pub fn link_stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    fn queues_empty(&self) -> bool {
        self.interfaces.iter().all(|i| i.is_idle())
    }

    /// Wait until no link has carried a packet and every queue has stayed
    /// empty for `quiet`
    ///
    /// A router holds a packet only between taking it off one queue and
    /// putting it on another, so `quiet` must comfortably exceed one router
    /// iteration. With a readvertise interval configured it must also exceed
    /// that interval.
    pub async fn settle(&self, quiet: Duration, timeout: Duration) -> SimResult<()> {
        let started = Instant::now();
        let poll = (quiet / 10).max(Duration::from_millis(1));
        let mut last_activity = self.counters.snapshot().activity();
        let mut quiet_since = Instant::now();

        loop {
            tokio::time::sleep(poll).await;

            let activity = self.counters.snapshot().activity();
            if activity != last_activity || !self.queues_empty() {
                last_activity = activity;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= quiet {
                debug!(elapsed = ?started.elapsed(), activity, "Network settled");
                return Ok(());
            }

            if started.elapsed() >= timeout {
                warn!(?timeout, activity, "Network did not settle");
                return Err(SimulationError::NotSettled(timeout));
            }
        }
    }

    /// Stop every node and collect their final state
    pub async fn shutdown(self) -> SimResult<NetworkReport> {
        self.stop.request_stop();

        let mut routers = BTreeMap::new();
        for handle in self.routers {
            let router = join(handle).await?;
            routers.insert(router.name().clone(), router);
        }
        let mut hosts = BTreeMap::new();
        for handle in self.hosts {
            let host = join(handle).await?;
            hosts.insert(host.addr().clone(), host);
        }
        let links = join(self.links).await?.stats();

        info!(moved = links.moved, dropped = links.dropped, "Network stopped");
        Ok(NetworkReport {
            routers,
            hosts,
            links,
            expected: self.expected,
        })
    }
}

impl fmt::Debug for RunningNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningNetwork")
            .field("routers", &self.routers.len())
            .field("hosts", &self.hosts.len())
            .field("links", &self.link_stats())
            .finish()
    }
}

async fn join<N: bellhop_core::Node>(handle: NodeHandle<N>) -> SimResult<N> {
    let node = handle.name().to_string();
    handle.join().await.map_err(|e| SimulationError::Join {
        node,
        reason: e.to_string(),
    })
}

/// A router whose converged cost disagrees with the shortest path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMismatch {
    pub router: NodeId,
    pub destination: NodeId,
    pub expected: Option<Cost>,
    pub actual: Option<Cost>,
}

impl fmt::Display for RouteMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |c: Option<Cost>| c.map_or_else(|| "unreachable".to_string(), |c| c.to_string());
        write!(
            f,
            "{} -> {}: expected {}, found {}",
            self.router,
            self.destination,
            show(self.expected),
            show(self.actual)
        )
    }
}

/// Final state of a stopped network
#[derive(Debug)]
pub struct NetworkReport {
    routers: BTreeMap<NodeId, Router>,
    hosts: BTreeMap<NodeId, Host>,
    links: LinkStats,
    expected: PathCosts,
}

/// Serializable counters of a [`NetworkReport`]
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub routers: BTreeMap<NodeId, RouterStats>,
    pub hosts: BTreeMap<NodeId, HostStats>,
    pub links: LinkStats,
    pub mismatches: Vec<RouteMismatch>,
}

impl NetworkReport {
    pub fn router(&self, name: &NodeId) -> Option<&Router> {
        self.routers.get(name)
    }

    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        self.routers.values()
    }

    pub fn host(&self, name: &NodeId) -> Option<&Host> {
        self.hosts.get(name)
    }

    /// Payloads a host received, oldest first
    pub fn inbox(&self, host: &NodeId) -> &[Vec<u8>] {
        self.hosts.get(host).map(Host::inbox).unwrap_or_default()
    }

    pub fn link_stats(&self) -> LinkStats {
        self.links
    }

    /// Compare every router's best costs with the shortest paths
    pub fn mismatches(&self) -> Vec<RouteMismatch> {
        let mut found = Vec::new();
        for (name, router) in &self.routers {
            let expected = self.expected.get(name);
            let table = router.table();
            let destinations = table
                .destinations()
                .chain(expected.into_iter().flat_map(|e| e.keys()));
            let mut seen = std::collections::BTreeSet::new();
            for destination in destinations {
                if !seen.insert(destination) {
                    continue;
                }
                let want = expected.and_then(|e| e.get(destination).copied());
                let have = table.best_cost(destination).filter(|&c| c < INFINITY);
                if want != have {
                    found.push(RouteMismatch {
                        router: name.clone(),
                        destination: destination.clone(),
                        expected: want,
                        actual: have,
                    });
                }
            }
        }
        found
    }

    /// Check if every router holds shortest path costs
    pub fn is_converged(&self) -> bool {
        self.mismatches().is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            routers: self
                .routers
                .iter()
                .map(|(n, r)| (n.clone(), r.stats()))
                .collect(),
            hosts: self
                .hosts
                .iter()
                .map(|(n, h)| (n.clone(), h.stats()))
                .collect(),
            links: self.links,
            mismatches: self.mismatches(),
        }
    }
}

impl fmt::Display for NetworkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, router) in &self.routers {
            let s = router.stats();
            writeln!(f, "Router {}", name)?;
            writeln!(f, "{}", router.table())?;
            writeln!(
                f,
                "  received {} forwarded {} delivered {} dropped {} adverts in/out {}/{}\n",
                s.received, s.forwarded, s.delivered, s.dropped, s.adverts_received, s.adverts_sent
            )?;
        }
        for (name, host) in &self.hosts {
            let s = host.stats();
            writeln!(f, "Host {}: sent {} received {}", name, s.sent, s.received)?;
            for payload in host.inbox() {
                writeln!(f, "  {}", String::from_utf8_lossy(payload))?;
            }
        }
        writeln!(
            f,
            "Links: moved {} dropped {}",
            self.links.moved, self.links.dropped
        )?;

        let mismatches = self.mismatches();
        if mismatches.is_empty() {
            write!(f, "All routing tables hold shortest paths")
        } else {
            writeln!(f, "{} routing entries differ from shortest paths:", mismatches.len())?;
            for m in &mismatches {
                writeln!(f, "  {}", m)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::TopologyBuilder;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    #[test]
    fn test_from_config_wires_every_node() {
        let config = TopologyBuilder::new(3).line().unwrap();
        let network = Network::from_config(&config).unwrap();
        assert_eq!(network.routers().len(), 3);
        assert_eq!(network.hosts().len(), 2);
        assert_eq!(network.links().links().len(), 4);
        assert_eq!(network.expected_costs().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_sender_is_rejected() {
        let config = TopologyBuilder::new(2).line().unwrap();
        let running = Network::from_config(&config).unwrap().start();
        let err = running.send(&id("H9"), &id("H1"), "x").await.unwrap_err();
        assert!(matches!(err, SimulationError::UnknownHost(_)));
        running.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_two_router_line_converges_and_delivers() {
        let config = TopologyBuilder::new(2).with_cost_range(4..=4).line().unwrap();
        let running = Network::from_config(&config).unwrap().start();
        running
            .settle(Duration::from_millis(50), Duration::from_secs(10))
            .await
            .unwrap();

        running.send(&id("H1"), &id("H2"), "ping").await.unwrap();
        running
            .settle(Duration::from_millis(50), Duration::from_secs(10))
            .await
            .unwrap();

        let report = running.shutdown().await.unwrap();
        assert!(report.is_converged(), "{}", report);
        assert_eq!(report.inbox(&id("H2")), &[b"ping".to_vec()]);
        let ra = report.router(&id("RA")).unwrap();
        assert_eq!(ra.table().best_cost(&id("H2")), Some(4 + 1));
        assert_eq!(ra.stats().forwarded, 1);
    }
}
