//! Network topology descriptions
//!
//! A [`TopologyConfig`] lists hosts, routers with their link costs, and the
//! links that wire node interfaces together. It is usually loaded from TOML:
//!
//! ```toml
//! [settings]
//! queue_capacity = 64
//! advertise_policy = "once_per_update"
//!
//! [[hosts]]
//! name = "H1"
//!
//! [[routers]]
//! name = "RA"
//! links = [{ neighbor = "H1", interface = 0, cost = 1 }]
//!
//! [[links]]
//! a = "H1"
//! b = "RA"
//! b_interface = 0
//! ```
//!
//! [`TopologyBuilder`] produces the same description programmatically for
//! line, ring and random networks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use bellhop_core::{NodeId, QueueCapacity};
use bellhop_routing::{AdvertisePolicy, Cost, CostTable, INFINITY, RouterConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::host::HostConfig;
use crate::link::LinkConfig;

/// Port every host uses
pub const HOST_PORT: usize = 0;

/// Timing and queueing shared by every node of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Capacity of every interface queue; absent means unbounded
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default = "default_put_timeout_ms")]
    pub put_timeout_ms: u64,
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
    #[serde(default)]
    pub advertise_policy: AdvertisePolicy,
    #[serde(default)]
    pub readvertise_interval_ms: Option<u64>,
    #[serde(default = "default_advertise_on_start")]
    pub advertise_on_start: bool,
}

fn default_put_timeout_ms() -> u64 {
    100
}

fn default_idle_backoff_ms() -> u64 {
    1
}

fn default_advertise_on_start() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue_capacity: None,
            put_timeout_ms: default_put_timeout_ms(),
            idle_backoff_ms: default_idle_backoff_ms(),
            advertise_policy: AdvertisePolicy::default(),
            readvertise_interval_ms: None,
            advertise_on_start: default_advertise_on_start(),
        }
    }
}

impl Settings {
    pub fn queue_capacity(&self) -> Result<QueueCapacity, ConfigError> {
        match self.queue_capacity {
            None => Ok(QueueCapacity::Unbounded),
            Some(n) => NonZeroUsize::new(n)
                .map(QueueCapacity::Bounded)
                .ok_or(ConfigError::InvalidSetting {
                    name: "queue_capacity",
                    reason: "must be at least 1; omit it for unbounded queues".into(),
                }),
        }
    }

    pub fn router_config(&self) -> Result<RouterConfig, ConfigError> {
        Ok(RouterConfig::default()
            .with_queue_capacity(self.queue_capacity()?)
            .with_put_timeout(Some(Duration::from_millis(self.put_timeout_ms)))
            .with_idle_backoff(Duration::from_millis(self.idle_backoff_ms))
            .with_advertise_policy(self.advertise_policy)
            .with_readvertise_interval(self.readvertise_interval_ms.map(Duration::from_millis))
            .with_advertise_on_start(self.advertise_on_start))
    }

    pub fn host_config(&self) -> Result<HostConfig, ConfigError> {
        Ok(HostConfig::default()
            .with_queue_capacity(self.queue_capacity()?)
            .with_put_timeout(Some(Duration::from_millis(self.put_timeout_ms)))
            .with_idle_backoff(Duration::from_millis(self.idle_backoff_ms)))
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::default().with_idle_backoff(Duration::from_millis(self.idle_backoff_ms))
    }
}

/// A `[[hosts]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEntry {
    pub name: NodeId,
}

/// One line of a router's cost table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEntry {
    pub neighbor: NodeId,
    pub interface: usize,
    pub cost: Cost,
}

/// A `[[routers]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterEntry {
    pub name: NodeId,
    #[serde(default)]
    pub links: Vec<CostEntry>,
}

/// A `[[links]]` entry joining two node interfaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub a: NodeId,
    #[serde(default)]
    pub a_interface: usize,
    pub b: NodeId,
    #[serde(default)]
    pub b_interface: usize,
}

impl LinkEntry {
    fn ends(&self) -> [(&NodeId, usize, &NodeId); 2] {
        [
            (&self.a, self.a_interface, &self.b),
            (&self.b, self.b_interface, &self.a),
        ]
    }
}

/// Complete description of a network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub hosts: Vec<HostEntry>,
    #[serde(default)]
    pub routers: Vec<RouterEntry>,
    #[serde(default)]
    pub links: Vec<LinkEntry>,
}

impl TopologyConfig {
    /// Load and validate a topology from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate a topology from a TOML string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Render(e.to_string()))
    }

    fn is_host(&self, name: &NodeId) -> bool {
        self.hosts.iter().any(|h| h.name == *name)
    }

    fn router(&self, name: &NodeId) -> Option<&RouterEntry> {
        self.routers.iter().find(|r| r.name == *name)
    }

    /// Build every router's cost table
    pub fn cost_tables(&self) -> Result<BTreeMap<NodeId, CostTable>, ConfigError> {
        self.routers
            .iter()
            .map(|router| {
                let table = CostTable::from_links(
                    router
                        .links
                        .iter()
                        .map(|l| (l.neighbor.clone(), l.interface, l.cost)),
                )?;
                Ok((router.name.clone(), table))
            })
            .collect()
    }

    /// Check that the description can be wired into a working network
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.queue_capacity()?;

        let mut names = BTreeSet::new();
        for name in self
            .hosts
            .iter()
            .map(|h| &h.name)
            .chain(self.routers.iter().map(|r| &r.name))
        {
            if !names.insert(name) {
                return Err(ConfigError::DuplicateNode(name.clone()));
            }
        }

        for router in &self.routers {
            let mut ports = BTreeMap::new();
            for entry in &router.links {
                if entry.neighbor == router.name {
                    return Err(ConfigError::SelfLink(router.name.clone()));
                }
                if !names.contains(&entry.neighbor) {
                    return Err(ConfigError::UnknownNode {
                        node: router.name.clone(),
                        unknown: entry.neighbor.clone(),
                    });
                }
                if let Some(other) = ports.insert(entry.interface, &entry.neighbor) {
                    if *other != entry.neighbor {
                        return Err(ConfigError::InterfaceReused {
                            node: router.name.clone(),
                            interface: entry.interface,
                        });
                    }
                }
            }
        }
        self.cost_tables()?;

        let mut wired = BTreeSet::new();
        for link in &self.links {
            if link.a == link.b {
                return Err(ConfigError::SelfLink(link.a.clone()));
            }
            for (node, port, peer) in link.ends() {
                if !names.contains(node) {
                    return Err(ConfigError::UnknownNode {
                        node: peer.clone(),
                        unknown: node.clone(),
                    });
                }
                if self.is_host(node) && port != HOST_PORT {
                    return Err(ConfigError::NoSuchInterface {
                        node: node.clone(),
                        interface: port,
                    });
                }
                if let Some(router) = self.router(node) {
                    let priced = router
                        .links
                        .iter()
                        .any(|e| e.interface == port && e.neighbor == *peer);
                    if !priced {
                        return Err(ConfigError::LinkWithoutCost {
                            router: node.clone(),
                            neighbor: peer.clone(),
                            interface: port,
                        });
                    }
                }
                if !wired.insert((node, port)) {
                    return Err(ConfigError::InterfaceReused {
                        node: node.clone(),
                        interface: port,
                    });
                }
            }
        }

        for router in &self.routers {
            for entry in &router.links {
                if !wired.contains(&(&router.name, entry.interface)) {
                    return Err(ConfigError::UnwiredInterface {
                        router: router.name.clone(),
                        neighbor: entry.neighbor.clone(),
                        interface: entry.interface,
                    });
                }
            }
        }

        // Any simple path has at most nodes - 1 hops
        let max_cost = self
            .routers
            .iter()
            .flat_map(|r| r.links.iter().map(|l| l.cost))
            .max()
            .unwrap_or(0);
        let hops = names.len().saturating_sub(1) as u64;
        if u64::from(max_cost) * hops >= u64::from(INFINITY) {
            return Err(ConfigError::CostsTooLarge {
                max_cost,
                nodes: names.len(),
            });
        }

        Ok(())
    }

    /// Shortest path costs from every router to every node
    ///
    /// Only routers relay, so hosts end paths but never extend them.
    pub fn shortest_paths(&self) -> BTreeMap<NodeId, BTreeMap<NodeId, Cost>> {
        self.routers
            .iter()
            .map(|source| {
                let mut dist: BTreeMap<&NodeId, Cost> = BTreeMap::from([(&source.name, 0)]);
                let mut done: BTreeSet<&NodeId> = BTreeSet::new();
                loop {
                    let closest = dist
                        .iter()
                        .filter(|(node, _)| !done.contains(*node))
                        .min_by_key(|(_, cost)| **cost)
                        .map(|(node, cost)| (*node, *cost));
                    let Some((node, cost)) = closest else {
                        break;
                    };
                    done.insert(node);
                    let Some(router) = self.router(node) else {
                        continue;
                    };
                    for entry in &router.links {
                        let candidate = cost + entry.cost;
                        let best = dist.entry(&entry.neighbor).or_insert(Cost::MAX);
                        if candidate < *best {
                            *best = candidate;
                        }
                    }
                }
                let dist = dist.into_iter().map(|(n, c)| (n.clone(), c)).collect();
                (source.name.clone(), dist)
            })
            .collect()
    }

    /// Short human-readable summary of nodes and links
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Topology:");
        let _ = writeln!(out, "  Hosts: {}", self.hosts.len());
        let _ = writeln!(out, "  Routers: {}", self.routers.len());
        let _ = writeln!(out, "  Links: {}\n", self.links.len());

        for link in &self.links {
            let costs: Vec<String> = link
                .ends()
                .iter()
                .filter_map(|(node, port, peer)| {
                    self.router(node)?
                        .links
                        .iter()
                        .find(|e| e.interface == *port && e.neighbor == **peer)
                        .map(|e| format!("{}->{}: {}", node, peer, e.cost))
                })
                .collect();
            let _ = writeln!(
                out,
                "  {}:{} <-> {}:{}  [{}]",
                link.a,
                link.a_interface,
                link.b,
                link.b_interface,
                costs.join(", ")
            );
        }
        out
    }
}

/// Most routers a preset can name (RA through RZ)
pub const MAX_PRESET_ROUTERS: usize = 26;

/// Name of the `index`-th preset router
pub fn router_name(index: usize) -> Result<NodeId, ConfigError> {
    if index >= MAX_PRESET_ROUTERS {
        return Err(ConfigError::RouterCount {
            requested: index + 1,
            min: 1,
            max: MAX_PRESET_ROUTERS,
        });
    }
    Ok(NodeId::new(format!("R{}", (b'A' + index as u8) as char))?)
}

/// Name of the `index`-th preset host (H1, H2, ...)
pub fn host_name(index: usize) -> Result<NodeId, ConfigError> {
    Ok(NodeId::new(format!("H{}", index + 1))?)
}

/// Incrementally assembled topology with automatic port numbering
#[derive(Default)]
struct Draft {
    config: TopologyConfig,
    next_port: BTreeMap<NodeId, usize>,
}

impl Draft {
    fn add_router(&mut self, name: NodeId) {
        self.config.routers.push(RouterEntry {
            name,
            links: Vec::new(),
        });
    }

    fn add_host(&mut self, name: NodeId) {
        self.config.hosts.push(HostEntry { name });
    }

    fn port_for(&mut self, node: &NodeId) -> usize {
        if self.config.is_host(node) {
            return HOST_PORT;
        }
        let next = self.next_port.entry(node.clone()).or_insert(0);
        let port = *next;
        *next += 1;
        port
    }

    fn connect(&mut self, a: &NodeId, b: &NodeId, cost: Cost) {
        let a_interface = self.port_for(a);
        let b_interface = self.port_for(b);
        for (node, port, peer) in [(a, a_interface, b), (b, b_interface, a)] {
            if let Some(router) = self.config.routers.iter_mut().find(|r| r.name == *node) {
                router.links.push(CostEntry {
                    neighbor: peer.clone(),
                    interface: port,
                    cost,
                });
            }
        }
        self.config.links.push(LinkEntry {
            a: a.clone(),
            a_interface,
            b: b.clone(),
            b_interface,
        });
    }

    fn finish(self) -> Result<TopologyConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Build a topology from undirected `(a, b, cost)` edges
///
/// Names listed in `hosts` become hosts; every other name is a router.
/// Router ports are numbered in edge order.
pub fn from_edges(
    settings: Settings,
    hosts: &[&str],
    edges: &[(&str, &str, Cost)],
) -> Result<TopologyConfig, ConfigError> {
    let mut draft = Draft::default();
    draft.config.settings = settings;
    for host in hosts {
        draft.add_host(NodeId::new(*host)?);
    }
    for (a, b, _) in edges {
        for name in [a, b] {
            let id = NodeId::new(*name)?;
            if !draft.config.is_host(&id) && draft.config.router(&id).is_none() {
                draft.add_router(id);
            }
        }
    }
    for (a, b, cost) in edges {
        draft.connect(&NodeId::new(*a)?, &NodeId::new(*b)?, *cost);
    }
    draft.finish()
}

/// Builder for preset topologies
///
/// Routers are named `RA`, `RB`, ... and two hosts `H1` and `H2` sit at
/// opposite ends of the network. Link costs are drawn from `cost_range`
/// with a seeded generator, so a given seed always yields the same network.
#[derive(Debug, Clone)]
pub struct TopologyBuilder {
    routers: usize,
    settings: Settings,
    cost_range: RangeInclusive<Cost>,
    host_cost: Cost,
    seed: u64,
}

impl TopologyBuilder {
    pub fn new(routers: usize) -> Self {
        Self {
            routers,
            settings: Settings::default(),
            cost_range: 1..=5,
            host_cost: 1,
            seed: 0,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cost_range(mut self, range: RangeInclusive<Cost>) -> Self {
        self.cost_range = range;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn start(&self, min: usize) -> Result<(Draft, Vec<NodeId>, StdRng), ConfigError> {
        if self.routers < min || self.routers > MAX_PRESET_ROUTERS {
            return Err(ConfigError::RouterCount {
                requested: self.routers,
                min,
                max: MAX_PRESET_ROUTERS,
            });
        }
        if self.cost_range.is_empty() || *self.cost_range.start() == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "cost_range",
                reason: format!("{:?} must be a non-empty range of positive costs", self.cost_range),
            });
        }

        let mut draft = Draft::default();
        draft.config.settings = self.settings.clone();
        let routers = (0..self.routers).map(router_name).collect::<Result<Vec<_>, _>>()?;
        for router in &routers {
            draft.add_router(router.clone());
        }
        Ok((draft, routers, StdRng::seed_from_u64(self.seed)))
    }

    fn attach_hosts(&self, draft: &mut Draft, at: [&NodeId; 2]) -> Result<(), ConfigError> {
        for (index, router) in at.into_iter().enumerate() {
            let host = host_name(index)?;
            draft.add_host(host.clone());
            draft.connect(&host, router, self.host_cost);
        }
        Ok(())
    }

    /// `H1 - RA - RB - ... - Rn - H2`
    pub fn line(self) -> Result<TopologyConfig, ConfigError> {
        let (mut draft, routers, mut rng) = self.start(1)?;
        for pair in routers.windows(2) {
            draft.connect(&pair[0], &pair[1], rng.random_range(self.cost_range.clone()));
        }
        self.attach_hosts(&mut draft, [&routers[0], &routers[routers.len() - 1]])?;
        draft.finish()
    }

    /// A closed loop of routers with hosts at opposite sides
    pub fn ring(self) -> Result<TopologyConfig, ConfigError> {
        let (mut draft, routers, mut rng) = self.start(3)?;
        for i in 0..routers.len() {
            let next = (i + 1) % routers.len();
            draft.connect(&routers[i], &routers[next], rng.random_range(self.cost_range.clone()));
        }
        self.attach_hosts(&mut draft, [&routers[0], &routers[routers.len() / 2]])?;
        draft.finish()
    }

    /// A random spanning tree plus each remaining router pair with
    /// probability `extra_links`
    pub fn random(self, extra_links: f64) -> Result<TopologyConfig, ConfigError> {
        if !(0.0..=1.0).contains(&extra_links) {
            return Err(ConfigError::InvalidSetting {
                name: "extra_links",
                reason: format!("{} is not a probability", extra_links),
            });
        }
        let (mut draft, routers, mut rng) = self.start(2)?;

        let mut edges = BTreeSet::new();
        for i in 1..routers.len() {
            let j = rng.random_range(0..i);
            edges.insert((j, i));
        }
        for i in 0..routers.len() {
            for j in (i + 1)..routers.len() {
                if !edges.contains(&(i, j)) && rng.random_bool(extra_links) {
                    edges.insert((i, j));
                }
            }
        }
        for (i, j) in edges {
            draft.connect(&routers[i], &routers[j], rng.random_range(self.cost_range.clone()));
        }

        self.attach_hosts(&mut draft, [&routers[0], &routers[routers.len() - 1]])?;
        draft.finish()
    }
}
