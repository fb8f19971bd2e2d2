//! Convergence tests for the distance-vector engine
//!
//! Routers are driven deterministically: each round moves every queued
//! packet across every wire, then lets every router process its queues. The
//! resulting tables are compared with shortest paths from Dijkstra.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bellhop_core::{Direction, Interface, NetworkPacket, NodeId};
use bellhop_routing::{AdvertisePolicy, CostTable, Router, RouterConfig, RoutingTable};

const MAX_ROUNDS: usize = 500;

fn id(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

/// Two interfaces joined back to back
struct Wire {
    a: Arc<Interface>,
    b: Arc<Interface>,
}

impl Wire {
    fn transmit(&self) -> usize {
        let mut moved = 0;
        for (from, to) in [(&self.a, &self.b), (&self.b, &self.a)] {
            while let Some(bytes) = from.get(Direction::Out) {
                to.try_put(bytes, Direction::In).unwrap();
                moved += 1;
            }
        }
        moved
    }
}

struct Harness {
    routers: BTreeMap<NodeId, Router>,
    wires: Vec<Wire>,
}

impl Harness {
    /// Build routers from undirected `(a, b, cost)` edges; ports are numbered
    /// per router in edge order
    fn new(edges: &[(&str, &str, u32)], config: RouterConfig) -> Self {
        let mut next_port: BTreeMap<NodeId, usize> = BTreeMap::new();
        let mut costs: BTreeMap<NodeId, CostTable> = BTreeMap::new();
        let mut ports = Vec::new();

        for (a, b, cost) in edges {
            let (a, b) = (id(a), id(b));
            let pa = *next_port.entry(a.clone()).and_modify(|p| *p += 1).or_insert(0);
            let pb = *next_port.entry(b.clone()).and_modify(|p| *p += 1).or_insert(0);
            costs.entry(a.clone()).or_default().insert(b.clone(), pa, *cost).unwrap();
            costs.entry(b.clone()).or_default().insert(a.clone(), pb, *cost).unwrap();
            ports.push(((a, pa), (b, pb)));
        }

        let routers: BTreeMap<NodeId, Router> = costs
            .into_iter()
            .map(|(name, table)| (name.clone(), Router::new(name, table, config.clone())))
            .collect();
        let wires = ports
            .into_iter()
            .map(|((a, pa), (b, pb))| Wire {
                a: routers[&a].interface(pa).unwrap().clone(),
                b: routers[&b].interface(pb).unwrap().clone(),
            })
            .collect();

        Self { routers, wires }
    }

    fn router(&self, name: &str) -> &Router {
        &self.routers[&id(name)]
    }

    fn best_costs(&self) -> BTreeMap<(NodeId, NodeId), u32> {
        self.routers
            .values()
            .flat_map(|r| {
                r.table()
                    .destinations()
                    .map(|d| ((r.name().clone(), d.clone()), r.table().best_cost(d).unwrap()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    async fn round(&mut self) -> usize {
        let mut activity: usize = self.wires.iter().map(Wire::transmit).sum();
        for router in self.routers.values_mut() {
            activity += router.process_queues().await;
        }
        activity
    }

    /// Bootstrap with one advertisement per router, then run until quiet.
    /// Every round checks that no best cost went up.
    async fn converge(&mut self) -> usize {
        for router in self.routers.values_mut() {
            router.broadcast_routes().await;
        }

        let mut previous = self.best_costs();
        for round in 1..=MAX_ROUNDS {
            let activity = self.round().await;

            let current = self.best_costs();
            for (key, old) in &previous {
                let new = current[key];
                assert!(new <= *old, "cost {:?} rose from {} to {}", key, old, new);
            }
            for router in self.routers.values() {
                assert_eq!(router.table().best_cost(router.name()), Some(0));
            }
            previous = current;

            if activity == 0 {
                return round;
            }
        }
        panic!("network did not go quiet within {} rounds", MAX_ROUNDS);
    }
}

/// All-pairs shortest paths over undirected edges
fn dijkstra(edges: &[(&str, &str, u32)]) -> BTreeMap<NodeId, BTreeMap<NodeId, u32>> {
    let mut adjacency: BTreeMap<NodeId, Vec<(NodeId, u32)>> = BTreeMap::new();
    for (a, b, cost) in edges {
        adjacency.entry(id(a)).or_default().push((id(b), *cost));
        adjacency.entry(id(b)).or_default().push((id(a), *cost));
    }

    adjacency
        .keys()
        .map(|source| {
            let mut dist: BTreeMap<NodeId, u32> = BTreeMap::from([(source.clone(), 0)]);
            let mut done: BTreeSet<NodeId> = BTreeSet::new();
            loop {
                let closest = dist
                    .iter()
                    .filter(|(n, _)| !done.contains(*n))
                    .min_by_key(|(_, d)| **d)
                    .map(|(n, d)| (n.clone(), *d));
                let Some((node, d)) = closest else {
                    break;
                };
                done.insert(node.clone());
                for (next, cost) in &adjacency[&node] {
                    let candidate = d + cost;
                    let entry = dist.entry(next.clone()).or_insert(u32::MAX);
                    if candidate < *entry {
                        *entry = candidate;
                    }
                }
            }
            (source.clone(), dist)
        })
        .collect()
}

fn assert_matches_reference(harness: &Harness, edges: &[(&str, &str, u32)]) {
    for (source, distances) in dijkstra(edges) {
        let table: &RoutingTable = harness.routers[&source].table();
        for (destination, expected) in distances {
            assert_eq!(
                table.best_cost(&destination),
                Some(expected),
                "{} -> {}\n{}",
                source,
                destination,
                table
            );
        }
    }
}

const LINE: &[(&str, &str, u32)] = &[("RA", "RB", 1), ("RB", "RC", 2)];

const MESH: &[(&str, &str, u32)] = &[
    ("RA", "RB", 4),
    ("RA", "RC", 1),
    ("RC", "RB", 1),
    ("RB", "RD", 5),
    ("RC", "RD", 8),
    ("RD", "RE", 3),
    ("RE", "RF", 1),
    ("RB", "RF", 20),
    ("RA", "RF", 2),
];

#[tokio::test]
async fn test_line_converges_and_forwards() {
    let mut harness = Harness::new(LINE, RouterConfig::default());
    harness.converge().await;
    assert_matches_reference(&harness, LINE);
    assert_eq!(harness.router("RA").table().best_cost(&id("RC")), Some(3));
    assert_eq!(harness.router("RA").next_hop(&id("RC")).unwrap(), id("RB"));
    assert_eq!(harness.router("RB").next_hop(&id("RC")).unwrap(), id("RC"));

    // A packet for RC arriving at RA leaves on RA's only port, toward RB
    let ra_port = harness.router("RA").interface(0).unwrap().clone();
    ra_port
        .try_put(NetworkPacket::data(id("RC"), "across").to_bytes(), Direction::In)
        .unwrap();
    harness.converge().await;

    assert_eq!(harness.router("RA").stats().forwarded, 1);
    assert_eq!(harness.router("RB").stats().forwarded, 1);
    assert_eq!(harness.router("RC").stats().delivered, 1);
}

#[tokio::test]
async fn test_mesh_matches_shortest_paths() {
    let mut harness = Harness::new(MESH, RouterConfig::default());
    harness.converge().await;
    assert_matches_reference(&harness, MESH);

    // Neighbors are reached over their own link even when the table knows
    // a cheaper path
    assert_eq!(harness.router("RB").table().best_cost(&id("RF")), Some(4));
    assert_eq!(harness.router("RB").next_hop(&id("RF")).unwrap(), id("RF"));
    assert_eq!(harness.router("RE").next_hop(&id("RA")).unwrap(), id("RF"));
}

/// RE's direct link to RA is dear; the ring RE-RD-RC-RB-RA is cheaper
const SHORTCUT: &[(&str, &str, u32)] = &[
    ("RE", "RA", 12),
    ("RE", "RD", 2),
    ("RD", "RC", 1),
    ("RC", "RB", 3),
    ("RB", "RA", 2),
    ("RA", "RH", 1),
];

#[tokio::test]
async fn test_data_avoids_expensive_neighbor_link() {
    let mut harness = Harness::new(SHORTCUT, RouterConfig::default());
    harness.converge().await;
    assert_matches_reference(&harness, SHORTCUT);

    let re = harness.router("RE");
    assert_eq!(re.table().best_cost(&id("RA")), Some(8));
    assert_eq!(re.costs().cost(&id("RA")), Some(12));
    assert_eq!(re.table().best_cost(&id("RH")), Some(9));
    assert_eq!(re.next_hop(&id("RH")).unwrap(), id("RD"));

    let re_port = re.interface(0).unwrap().clone();
    re_port
        .try_put(NetworkPacket::data(id("RH"), "around").to_bytes(), Direction::In)
        .unwrap();
    harness.converge().await;

    for hop in ["RE", "RD", "RC", "RB", "RA"] {
        assert_eq!(harness.router(hop).stats().forwarded, 1, "{}", hop);
    }
    assert_eq!(harness.router("RH").stats().delivered, 1);
}

#[tokio::test]
async fn test_every_improvement_policy_converges_to_same_tables() {
    let mut coalesced = Harness::new(MESH, RouterConfig::default());
    let mut flooded = Harness::new(
        MESH,
        RouterConfig::default().with_advertise_policy(AdvertisePolicy::EveryImprovement),
    );
    coalesced.converge().await;
    flooded.converge().await;

    assert_eq!(coalesced.best_costs(), flooded.best_costs());
    let sent = |h: &Harness| h.routers.values().map(|r| r.stats().adverts_sent).sum::<u64>();
    assert!(sent(&flooded) >= sent(&coalesced));
}

#[tokio::test]
async fn test_parallel_links_use_cheapest() {
    let edges = &[("RA", "RB", 5), ("RA", "RB", 2), ("RB", "RC", 1)];
    let mut harness = Harness::new(edges, RouterConfig::default());
    harness.converge().await;

    assert_eq!(harness.router("RA").table().best_cost(&id("RB")), Some(2));
    assert_eq!(harness.router("RA").table().best_cost(&id("RC")), Some(3));
    let link = harness.router("RA").costs().link(&id("RB")).unwrap();
    assert_eq!(link.interface, 1);
}

#[tokio::test]
async fn test_islands_never_learn_each_other() {
    let edges = &[("RA", "RB", 1), ("RC", "RD", 1)];
    let mut harness = Harness::new(edges, RouterConfig::default());
    harness.converge().await;

    assert!(!harness.router("RA").table().contains(&id("RC")));
    assert!(!harness.router("RD").table().contains(&id("RA")));
    assert_eq!(harness.router("RA").table().best_cost(&id("RB")), Some(1));
    assert!(matches!(
        harness.router("RA").next_hop(&id("RD")),
        Err(bellhop_routing::RoutingError::UnknownDestination(_))
    ));
}
