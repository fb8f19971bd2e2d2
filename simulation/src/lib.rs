//! # Bellhop Simulation
//!
//! Runs distance-vector routers, hosts and links as concurrent tasks on a
//! Tokio runtime.
//!
//! ## Overview
//!
//! A network is described by a [`TopologyConfig`], loaded from TOML or built
//! with [`TopologyBuilder`]. [`Network::from_config`] turns the description
//! into nodes:
//!
//! - **Hosts** (`host.rs`): endpoints that send and receive data packets
//! - **Routers** (`bellhop-routing`): forward data and exchange route adverts
//! - **Links** (`link.rs`): carry packets between interfaces, dropping on full
//! - **Network** (`network.rs`): spawns everything and detects quiescence
//! - **Scenarios** (`scenarios.rs`): line, diamond and random presets
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use bellhop_simulation::*;
//!
//! let config = line_topology(Settings::default())?;
//! let running = Network::from_config(&config)?.start();
//!
//! running.settle(Duration::from_millis(100), Duration::from_secs(10)).await?;
//! running.send(&"H1".parse()?, &"H2".parse()?, "hello").await?;
//! running.settle(Duration::from_millis(100), Duration::from_secs(10)).await?;
//!
//! let report = running.shutdown().await?;
//! assert!(report.is_converged());
//! println!("{}", report);
//! ```

pub mod error;
pub mod host;
pub mod link;
pub mod network;
pub mod scenarios;
pub mod topology;

pub use error::{ConfigError, SimResult, SimulationError};
pub use host::{Host, HostConfig, HostSender, HostStats};
pub use link::{Endpoint, Link, LinkConfig, LinkCounters, LinkLayer, LinkStats, Transfer};
pub use network::{
    Network, NetworkReport, PathCosts, ReportSummary, RouteMismatch, RunningNetwork,
};
pub use scenarios::{
    ScenarioOptions, diamond_topology, line_topology, random_topology, run_scenario,
};
pub use topology::{
    CostEntry, HOST_PORT, HostEntry, LinkEntry, MAX_PRESET_ROUTERS, RouterEntry, Settings,
    TopologyBuilder, TopologyConfig, from_edges, host_name, router_name,
};
