//! Distance-vector routing table
//!
//! The [`RoutingTable`] maps each destination to the cost every known
//! opinion source claims for reaching it:
//!
//! ```text
//! destination → { opinion source → cost }
//! ```
//!
//! The owner's own column holds its best-known costs. Other columns hold
//! what neighbors last advertised. The owner's entry for itself is always 0,
//! destinations are never removed, and the owner's cost to any destination
//! only ever decreases.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display};

use bellhop_core::NodeId;

use crate::advert::RouteAdvert;
use crate::cost::{Cost, CostTable, INFINITY, add_costs};
use crate::error::{RoutingError, RoutingResult};

/// Costs claimed by each opinion source for one destination
pub type CostVector = BTreeMap<NodeId, Cost>;

/// Full table shape, as carried in advertisements
pub type RouteMap = BTreeMap<NodeId, CostVector>;

/// A strict decrease of the owner's cost to a destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Improvement {
    pub destination: NodeId,
    /// Router whose path produced the new cost
    pub via: NodeId,
    pub old: Cost,
    pub new: Cost,
}

/// Routing table exclusively owned by one router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    owner: NodeId,
    routes: RouteMap,
}

impl RoutingTable {
    /// Table containing only the owner's zero-cost entry for itself
    pub fn new(owner: NodeId) -> Self {
        let mut routes = RouteMap::new();
        routes.insert(owner.clone(), CostVector::from([(owner.clone(), 0)]));
        Self { owner, routes }
    }

    /// Table seeded with the direct link cost to every neighbor
    pub fn seeded(owner: NodeId, costs: &CostTable) -> Self {
        let mut table = Self::new(owner);
        for neighbor in costs.neighbors() {
            if *neighbor == table.owner {
                continue;
            }
            if let Some(cost) = costs.cost(neighbor) {
                table
                    .routes
                    .entry(neighbor.clone())
                    .or_default()
                    .insert(table.owner.clone(), cost);
            }
        }
        table
    }

    pub fn owner(&self) -> &NodeId {
        &self.owner
    }

    /// The raw mapping
    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    /// Cost `source` claims for reaching `destination`
    pub fn cost(&self, destination: &NodeId, source: &NodeId) -> Option<Cost> {
        self.routes.get(destination)?.get(source).copied()
    }

    /// Owner's best-known cost to `destination`
    pub fn best_cost(&self, destination: &NodeId) -> Option<Cost> {
        self.cost(destination, &self.owner)
    }

    pub fn contains(&self, destination: &NodeId) -> bool {
        self.routes.contains_key(destination)
    }

    /// Destinations in identifier order
    pub fn destinations(&self) -> impl Iterator<Item = &NodeId> {
        self.routes.keys()
    }

    /// Number of known destinations
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every node other than the owner whose opinion the table records
    pub fn opinion_sources(&self) -> BTreeSet<NodeId> {
        self.routes
            .values()
            .flat_map(|vector| vector.keys())
            .filter(|source| **source != self.owner)
            .cloned()
            .collect()
    }

    fn cost_or_infinity(&self, destination: &NodeId, source: &NodeId) -> Cost {
        self.cost(destination, source).unwrap_or(INFINITY)
    }

    /// Record the advertiser's opinion for every destination either side knows
    ///
    /// Destinations new to the owner start at `INFINITY` for the owner.
    /// Destinations the advert omits count as `INFINITY` for the advertiser.
    pub fn import(&mut self, advert: &RouteAdvert) {
        let advertiser = &advert.advertiser;
        for destination in advert.routes.keys() {
            if !self.routes.contains_key(destination) {
                self.routes.insert(
                    destination.clone(),
                    CostVector::from([(self.owner.clone(), INFINITY)]),
                );
            }
        }

        for (destination, vector) in self.routes.iter_mut() {
            let claimed = advert
                .routes
                .get(destination)
                .and_then(|theirs| theirs.get(advertiser))
                .copied()
                .unwrap_or(INFINITY)
                .min(INFINITY);
            vector.insert(advertiser.clone(), claimed);
        }
    }

    /// Bellman-Ford relaxation of the owner's column
    ///
    /// For every destination `d` and opinion source `r` (not `d`), tries
    /// `cost(r, owner) + cost(d, r)` and keeps it if strictly cheaper.
    /// Passes repeat until one changes nothing, so an improvement to the
    /// cost of reaching `r` is applied to destinations visited before it.
    /// Returns each accepted improvement in the order it was applied.
    pub fn relax(&mut self) -> Vec<Improvement> {
        let mut improvements = Vec::new();
        while self.relax_pass(&mut improvements) {}
        improvements
    }

    fn relax_pass(&mut self, improvements: &mut Vec<Improvement>) -> bool {
        let sources = self.opinion_sources();
        let destinations: Vec<NodeId> = self.routes.keys().cloned().collect();
        let before = improvements.len();

        for destination in &destinations {
            for via in &sources {
                if via == destination {
                    continue;
                }
                let candidate = add_costs(
                    self.cost_or_infinity(via, &self.owner),
                    self.cost_or_infinity(destination, via),
                );
                let current = self.cost_or_infinity(destination, &self.owner);
                if candidate < current {
                    if let Some(vector) = self.routes.get_mut(destination) {
                        vector.insert(self.owner.clone(), candidate);
                    }
                    improvements.push(Improvement {
                        destination: destination.clone(),
                        via: via.clone(),
                        old: current,
                        new: candidate,
                    });
                }
            }
        }

        improvements.len() > before
    }

    /// Choose the neighbor to forward toward a non-neighbor destination
    ///
    /// Candidates are neighbors that have advertised. Each is scored with the
    /// cost of the link the packet will leave on plus the neighbor's claimed
    /// cost to `destination`; the first minimum in identifier order wins.
    pub fn next_hop(&self, destination: &NodeId, costs: &CostTable) -> RoutingResult<NodeId> {
        if !self.contains(destination) {
            return Err(RoutingError::UnknownDestination(destination.clone()));
        }

        let mut best: Option<(Cost, &NodeId)> = None;
        for candidate in costs.neighbors() {
            if candidate == destination || *candidate == self.owner {
                continue;
            }
            let (Some(claimed), Some(link)) = (self.cost(destination, candidate), costs.cost(candidate))
            else {
                continue;
            };
            let total = add_costs(link, claimed);
            if total >= INFINITY {
                continue;
            }
            if best.is_none_or(|(cost, _)| total < cost) {
                best = Some((total, candidate));
            }
        }

        best.map(|(_, hop)| hop.clone())
            .ok_or_else(|| RoutingError::NoRoute(destination.clone()))
    }
}

fn render_cost(cost: Option<Cost>) -> String {
    match cost {
        Some(c) if c < INFINITY => c.to_string(),
        Some(_) => "∞".to_string(),
        None => "-".to_string(),
    }
}

impl Display for RoutingTable {
    /// Grid of opinion sources (rows) by destinations (columns)
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const CELL: usize = 5;

        let rows: Vec<&NodeId> = std::iter::once(&self.owner)
            .chain(
                self.routes
                    .values()
                    .flat_map(|v| v.keys())
                    .filter(|s| **s != self.owner)
                    .collect::<BTreeSet<_>>(),
            )
            .collect();
        let rule = format!(
            "{}\n",
            std::iter::repeat_n(format!("{:-<w$}", "", w = CELL + 2), self.routes.len() + 1)
                .collect::<Vec<_>>()
                .join("+")
        );

        write!(f, " {:<w$} ", self.owner.as_str(), w = CELL)?;
        for destination in self.routes.keys() {
            write!(f, "| {:>w$} ", destination.as_str(), w = CELL)?;
        }
        writeln!(f)?;
        f.write_str(&rule)?;

        for source in rows {
            write!(f, " {:<w$} ", source.as_str(), w = CELL)?;
            for vector in self.routes.values() {
                write!(f, "| {:>w$} ", render_cost(vector.get(source).copied()), w = CELL)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn advert(advertiser: &str, entries: &[(&str, Cost)]) -> RouteAdvert {
        let advertiser = id(advertiser);
        let routes = entries
            .iter()
            .map(|(d, c)| (id(d), CostVector::from([(advertiser.clone(), *c)])))
            .collect();
        RouteAdvert { advertiser, routes }
    }

    fn ra_costs() -> CostTable {
        CostTable::from_links([(id("H1"), 0, 1), (id("RB"), 1, 1)]).unwrap()
    }

    #[test]
    fn test_seeded_with_self_and_neighbors() {
        let table = RoutingTable::seeded(id("RA"), &ra_costs());
        assert_eq!(table.best_cost(&id("RA")), Some(0));
        assert_eq!(table.best_cost(&id("H1")), Some(1));
        assert_eq!(table.best_cost(&id("RB")), Some(1));
        assert_eq!(table.len(), 3);
        assert!(table.opinion_sources().is_empty());
    }

    #[test]
    fn test_import_and_relax_learns_remote_destination() {
        let mut table = RoutingTable::seeded(id("RA"), &ra_costs());
        table.import(&advert("RB", &[("RB", 0), ("RA", 1), ("RC", 2), ("H2", 3)]));

        assert_eq!(table.best_cost(&id("RC")), Some(INFINITY));
        assert_eq!(table.cost(&id("H1"), &id("RB")), Some(INFINITY));

        let improvements = table.relax();
        assert_eq!(table.best_cost(&id("RC")), Some(3));
        assert_eq!(table.best_cost(&id("H2")), Some(4));
        assert_eq!(table.best_cost(&id("RA")), Some(0));
        assert_eq!(improvements.len(), 2);
        assert!(improvements.iter().all(|i| i.via == id("RB") && i.old == INFINITY));
    }

    #[test]
    fn test_costs_never_increase() {
        let mut table = RoutingTable::seeded(id("RA"), &ra_costs());
        table.import(&advert("RB", &[("RB", 0), ("RC", 2)]));
        table.relax();
        assert_eq!(table.best_cost(&id("RC")), Some(3));

        // A worse advert later must not raise the owner's cost
        table.import(&advert("RB", &[("RB", 0), ("RC", 50)]));
        assert!(table.relax().is_empty());
        assert_eq!(table.best_cost(&id("RC")), Some(3));
        assert_eq!(table.cost(&id("RC"), &id("RB")), Some(50));
    }

    #[test]
    fn test_advertised_costs_clamped() {
        let mut table = RoutingTable::new(id("RA"));
        table.import(&advert("RB", &[("RC", 1_000_000)]));
        assert_eq!(table.cost(&id("RC"), &id("RB")), Some(INFINITY));
        assert!(table.relax().is_empty());
    }

    #[test]
    fn test_next_hop_prefers_cheapest_advertiser() {
        let costs = CostTable::from_links([(id("RB"), 0, 1), (id("RC"), 1, 5)]).unwrap();
        let mut table = RoutingTable::seeded(id("RA"), &costs);
        table.import(&advert("RB", &[("RB", 0), ("RD", 10)]));
        table.import(&advert("RC", &[("RC", 0), ("RD", 1)]));
        table.relax();

        assert_eq!(table.best_cost(&id("RD")), Some(6));
        assert_eq!(table.next_hop(&id("RD"), &costs).unwrap(), id("RC"));
    }

    #[test]
    fn test_next_hop_scores_by_outgoing_link() {
        // RA reaches RB more cheaply through RC than over its own RB link,
        // but a packet handed to RB still crosses that expensive link
        let costs =
            CostTable::from_links([(id("RB"), 0, 12), (id("RC"), 1, 2), (id("RD"), 2, 4)]).unwrap();
        let mut table = RoutingTable::seeded(id("RA"), &costs);
        table.import(&advert("RC", &[("RC", 0), ("RB", 3), ("RX", 4)]));
        table.import(&advert("RB", &[("RB", 0), ("RX", 1)]));
        table.import(&advert("RD", &[("RD", 0), ("RX", 5)]));
        table.relax();

        assert_eq!(table.best_cost(&id("RB")), Some(5));
        assert_eq!(table.best_cost(&id("RX")), Some(6));
        assert_eq!(table.next_hop(&id("RX"), &costs).unwrap(), id("RC"));
    }

    #[test]
    fn test_next_hop_errors() {
        let costs = ra_costs();
        let mut table = RoutingTable::seeded(id("RA"), &costs);
        assert!(matches!(
            table.next_hop(&id("RZ"), &costs),
            Err(RoutingError::UnknownDestination(_))
        ));

        table.import(&advert("RB", &[("RB", 0)]));
        table.import(&advert("RC", &[("RZ", 2)]));
        assert!(matches!(
            table.next_hop(&id("RZ"), &costs),
            Err(RoutingError::NoRoute(_))
        ));
    }

    #[test]
    fn test_display_marks_infinity() {
        let mut table = RoutingTable::seeded(id("RA"), &ra_costs());
        table.import(&advert("RB", &[("RB", 0)]));
        let rendered = table.to_string();
        assert!(rendered.starts_with(" RA"));
        assert!(rendered.contains('∞'));
        assert_eq!(rendered.lines().count(), 4);
    }
}
