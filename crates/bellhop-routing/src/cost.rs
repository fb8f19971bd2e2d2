//! Link costs
//!
//! A [`CostTable`] is a router's static view of its direct links:
//! neighbor → {interface index → cost}. It is fixed once the router is
//! built.

use std::collections::BTreeMap;

use bellhop_core::NodeId;

use crate::error::{RoutingError, RoutingResult};

/// Path or link cost
pub type Cost = u32;

/// "No known route". Every sum of costs saturates here.
pub const INFINITY: Cost = 9999;

/// Compose two costs, saturating at [`INFINITY`]
pub fn add_costs(a: Cost, b: Cost) -> Cost {
    a.saturating_add(b).min(INFINITY)
}

/// A direct link chosen for a neighbor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborLink {
    pub interface: usize,
    pub cost: Cost,
}

/// Static per-router link configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostTable {
    links: BTreeMap<NodeId, BTreeMap<usize, Cost>>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(neighbor, interface, cost)` triples
    pub fn from_links<I>(links: I) -> RoutingResult<Self>
    where
        I: IntoIterator<Item = (NodeId, usize, Cost)>,
    {
        let mut table = Self::new();
        for (neighbor, interface, cost) in links {
            table.insert(neighbor, interface, cost)?;
        }
        Ok(table)
    }

    /// Add a link, builder style
    pub fn with_link(mut self, neighbor: NodeId, interface: usize, cost: Cost) -> RoutingResult<Self> {
        self.insert(neighbor, interface, cost)?;
        Ok(self)
    }

    /// Record a link; costs must lie in `1..INFINITY`
    pub fn insert(&mut self, neighbor: NodeId, interface: usize, cost: Cost) -> RoutingResult<()> {
        if cost == 0 || cost >= INFINITY {
            return Err(RoutingError::InvalidCost { neighbor, cost });
        }
        self.links.entry(neighbor).or_default().insert(interface, cost);
        Ok(())
    }

    /// The link to use for a neighbor: cheapest, lowest interface on ties
    pub fn link(&self, neighbor: &NodeId) -> Option<NeighborLink> {
        self.links
            .get(neighbor)?
            .iter()
            .min_by_key(|&(_, cost)| *cost)
            .map(|(&interface, &cost)| NeighborLink { interface, cost })
    }

    /// Cost of the chosen link to a neighbor
    pub fn cost(&self, neighbor: &NodeId) -> Option<Cost> {
        self.link(neighbor).map(|l| l.cost)
    }

    pub fn is_neighbor(&self, id: &NodeId) -> bool {
        self.links.contains_key(id)
    }

    /// Neighbors in identifier order
    pub fn neighbors(&self) -> impl Iterator<Item = &NodeId> {
        self.links.keys()
    }

    /// Every configured link as `(neighbor, interface, cost)`
    pub fn links(&self) -> impl Iterator<Item = (&NodeId, usize, Cost)> {
        self.links
            .iter()
            .flat_map(|(n, ifaces)| ifaces.iter().map(move |(&i, &c)| (n, i, c)))
    }

    /// Number of interfaces a router needs to serve every link
    pub fn interface_count(&self) -> usize {
        self.links
            .values()
            .flat_map(|ifaces| ifaces.keys())
            .max()
            .map_or(0, |&max| max + 1)
    }

    /// Number of neighbors
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
