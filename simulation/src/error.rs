//! Error types for building and running simulated networks

use std::path::PathBuf;

use bellhop_core::{IdentityError, NodeId, QueueError};
use bellhop_routing::RoutingError;
use thiserror::Error;

/// Problems found in a topology description
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse topology: {0}")]
    Parse(String),

    #[error("Failed to render topology: {0}")]
    Render(String),

    #[error("Invalid node name: {0}")]
    InvalidName(#[from] IdentityError),

    #[error("Node {0} is defined more than once")]
    DuplicateNode(NodeId),

    #[error("{0} cannot link to itself")]
    SelfLink(NodeId),

    #[error("{node} refers to unknown node {unknown}")]
    UnknownNode { node: NodeId, unknown: NodeId },

    #[error("Interface {interface} of {node} is used by more than one link")]
    InterfaceReused { node: NodeId, interface: usize },

    #[error("{node} has no interface {interface}")]
    NoSuchInterface { node: NodeId, interface: usize },

    #[error("Router {router} has no cost for {neighbor} on interface {interface}")]
    LinkWithoutCost {
        router: NodeId,
        neighbor: NodeId,
        interface: usize,
    },

    #[error("Router {router} lists {neighbor} on interface {interface} but no link wires it")]
    UnwiredInterface {
        router: NodeId,
        neighbor: NodeId,
        interface: usize,
    },

    #[error("Invalid link cost: {0}")]
    Cost(#[from] RoutingError),

    #[error("Costs up to {max_cost} over {nodes} nodes can reach the infinity sentinel")]
    CostsTooLarge { max_cost: u32, nodes: usize },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("Topology preset needs between {min} and {max} routers, got {requested}")]
    RouterCount {
        requested: usize,
        min: usize,
        max: usize,
    },
}

/// Errors raised while running a simulated network
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid node name: {0}")]
    Identity(#[from] IdentityError),

    #[error("No host named {0}")]
    UnknownHost(NodeId),

    #[error("Network still active after {0:?}")]
    NotSettled(std::time::Duration),

    #[error("Node task {node} failed: {reason}")]
    Join { node: String, reason: String },
}

/// Result type for simulation operations
pub type SimResult<T> = Result<T, SimulationError>;
