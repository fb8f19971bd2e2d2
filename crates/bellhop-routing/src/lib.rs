//! # Bellhop Routing
//!
//! Distance-vector routing for Bellhop networks.
//!
//! Every router knows only the cost of its own links. Routers repeatedly
//! exchange their whole routing tables with neighbors and relax their own
//! costs (Bellman-Ford) until nothing improves, at which point every router
//! holds the shortest-path cost to every reachable destination.
//!
//! ## Core Components
//!
//! - [`CostTable`]: a router's static link costs, per neighbor and interface
//! - [`RoutingTable`]: destination → {opinion source → cost}
//! - [`RouteAdvert`]: a table snapshot carried in a Control packet
//! - [`Router`]: the engine that forwards data and merges advertisements
//!
//! ## Forwarding
//!
//! 1. **LOCAL**: packets addressed to the router itself are delivered
//! 2. **DIRECT**: neighbors are reached over their cheapest link
//! 3. **VIA**: otherwise the advertising neighbor minimizing its link cost
//!    plus its claimed cost to the destination is the next hop
//! 4. **DROP**: unknown or unreachable destinations, and full queues
//!
//! ## Example
//!
//! ```rust,ignore
//! use bellhop_core::{NodeId, spawn};
//! use bellhop_routing::{CostTable, Router, RouterConfig};
//!
//! let costs = CostTable::new()
//!     .with_link(NodeId::new("H1")?, 0, 1)?
//!     .with_link(NodeId::new("RB")?, 1, 3)?;
//! let router = Router::new(NodeId::new("RA")?, costs, RouterConfig::default());
//! let handle = spawn(router);
//! // ... later
//! let router = handle.stop().await?;
//! println!("{}", router.table());
//! ```

pub mod advert;
pub mod config;
pub mod cost;
pub mod error;
pub mod router;
pub mod table;

pub use advert::RouteAdvert;
pub use config::{AdvertisePolicy, RouterConfig};
pub use cost::{Cost, CostTable, INFINITY, NeighborLink, add_costs};
pub use error::{RoutingError, RoutingResult};
pub use router::{Router, RouterStats};
pub use table::{CostVector, Improvement, RouteMap, RoutingTable};
