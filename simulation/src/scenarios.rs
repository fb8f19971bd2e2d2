//! Pre-defined simulation scenarios
//!
//! Each scenario wires a network, waits for routing to converge, sends data
//! between the hosts in both directions and returns the final report.

use std::time::Duration;

use bellhop_core::NodeId;
use tracing::info;

use crate::error::{ConfigError, SimResult};
use crate::network::{Network, NetworkReport};
use crate::topology::{Settings, TopologyBuilder, TopologyConfig, from_edges};

/// How a scenario is driven
#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    /// Messages each host sends to every other host
    pub messages: usize,
    /// Quiet window that counts as quiescence
    pub quiet: Duration,
    /// Give up waiting for quiescence after this long
    pub timeout: Duration,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            messages: 3,
            quiet: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScenarioOptions {
    pub fn with_messages(mut self, messages: usize) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_quiet(mut self, quiet: Duration) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `H1 - RA - RB - RC - H2`; the router links cost 1 and 2
pub fn line_topology(settings: Settings) -> Result<TopologyConfig, ConfigError> {
    from_edges(
        settings,
        &["H1", "H2"],
        &[
            ("H1", "RA", 1),
            ("RA", "RB", 1),
            ("RB", "RC", 2),
            ("RC", "H2", 1),
        ],
    )
}

/// Four routers in a diamond where the cheap path has more hops
///
/// ```text
///        1   RB   2
///   H1 - RA      RD - H2
///        7   RC   1
/// ```
pub fn diamond_topology(settings: Settings) -> Result<TopologyConfig, ConfigError> {
    from_edges(
        settings,
        &["H1", "H2"],
        &[
            ("H1", "RA", 1),
            ("RA", "RB", 1),
            ("RA", "RC", 7),
            ("RB", "RD", 2),
            ("RC", "RD", 1),
            ("RD", "H2", 1),
        ],
    )
}

/// A seeded random connected network of `routers` routers
pub fn random_topology(
    settings: Settings,
    routers: usize,
    extra_links: f64,
    seed: u64,
) -> Result<TopologyConfig, ConfigError> {
    TopologyBuilder::new(routers)
        .with_settings(settings)
        .with_seed(seed)
        .random(extra_links)
}

/// Run a topology to convergence, exchange messages between every pair of
/// hosts, and stop it
pub async fn run_scenario(
    config: &TopologyConfig,
    options: &ScenarioOptions,
) -> SimResult<NetworkReport> {
    let network = Network::from_config(config)?;
    let running = network.start();

    running.settle(options.quiet, options.timeout).await?;
    info!(stats = ?running.link_stats(), "Routing converged");

    let hosts: Vec<&NodeId> = config.hosts.iter().map(|h| &h.name).collect();
    for from in &hosts {
        for to in hosts.iter().filter(|to| *to != from) {
            for n in 1..=options.messages {
                let payload = format!("message {} from {} to {}", n, from, to);
                running.send(from, to, payload).await?;
            }
        }
    }

    running.settle(options.quiet, options.timeout).await?;
    let report = running.shutdown().await?;
    info!(converged = report.is_converged(), "Scenario finished");
    Ok(report)
}
