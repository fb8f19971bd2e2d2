//! Bellhop - distance-vector routing simulation
//!
//! Wires hosts and routers into a network, lets routing converge, sends a
//! few messages between the hosts and prints every router's table.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use bellhop_logging::{BellhopSubscriberBuilder, LogConfig};
use bellhop_simulation::{
    ScenarioOptions, Settings, TopologyBuilder, TopologyConfig, diamond_topology, line_topology,
    random_topology, run_scenario,
};

#[derive(Parser)]
#[command(
    name = "bellhop",
    about = "Distance-vector routing simulation over concurrent hosts, routers and links",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log JSON lines instead of human-readable output
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write JSONL logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Messages each host sends to every other host
    #[arg(short, long, global = true, default_value = "3")]
    messages: usize,

    /// Quiet window in milliseconds that counts as quiescence
    #[arg(long, global = true, default_value = "100")]
    quiet_ms: u64,

    /// Seconds to wait for quiescence before giving up
    #[arg(long, global = true, default_value = "30")]
    timeout_secs: u64,

    /// Print counters as JSON instead of tables
    #[arg(long, global = true)]
    summary_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a topology loaded from a TOML file
    Run {
        #[arg(short, long)]
        topology: PathBuf,
    },

    /// Run H1 - RA - RB - RC - H2
    Line,

    /// Run a four-router diamond where the cheap path has more hops
    Diamond,

    /// Run a seeded random connected network
    Random {
        /// Number of routers (max 26)
        #[arg(short, long, default_value = "6")]
        routers: usize,

        /// Probability of each extra router-to-router link
        #[arg(short, long, default_value = "0.3")]
        extra_links: f64,

        #[arg(short, long, default_value = "0")]
        seed: u64,
    },

    /// Validate a topology file and print its shortest paths
    Show { topology: PathBuf },

    /// Write a preset topology as TOML
    Generate {
        #[arg(value_enum)]
        shape: Shape,

        /// Number of routers (max 26)
        #[arg(short, long, default_value = "4")]
        routers: usize,

        #[arg(short, long, default_value = "0")]
        seed: u64,

        /// Output file; stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shape {
    Line,
    Ring,
    Random,
}

fn log_config(cli: &Cli) -> LogConfig {
    let mut config = if cli.json_logs {
        LogConfig::default()
    } else {
        LogConfig::interactive()
    };
    if cli.verbose {
        config.default_level = "debug".to_string();
    }
    if let Some(dir) = &cli.log_dir {
        config.file = LogConfig::recorded(dir.clone()).file;
    }
    config
}

fn show(config: &TopologyConfig) {
    println!("{}", config.describe());
    println!("Shortest paths:");
    for (router, costs) in config.shortest_paths() {
        let line: Vec<String> = costs
            .iter()
            .map(|(dest, cost)| format!("{}={}", dest, cost))
            .collect();
        println!("  {}: {}", router, line.join(" "));
    }
}

async fn run(cli: &Cli, config: TopologyConfig) -> anyhow::Result<()> {
    show(&config);

    let options = ScenarioOptions::default()
        .with_messages(cli.messages)
        .with_quiet(Duration::from_millis(cli.quiet_ms))
        .with_timeout(Duration::from_secs(cli.timeout_secs));
    let report = run_scenario(&config, &options).await?;

    if cli.summary_json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        println!("\n{}", report);
    }

    if !report.is_converged() {
        bail!("routing did not converge to shortest paths");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = BellhopSubscriberBuilder::new()
        .with_config(log_config(&cli))
        .init();

    match &cli.command {
        Commands::Run { topology } => {
            let config = TopologyConfig::load(topology)
                .with_context(|| format!("loading {}", topology.display()))?;
            run(&cli, config).await?;
        }
        Commands::Line => {
            run(&cli, line_topology(Settings::default())?).await?;
        }
        Commands::Diamond => {
            run(&cli, diamond_topology(Settings::default())?).await?;
        }
        Commands::Random {
            routers,
            extra_links,
            seed,
        } => {
            let config = random_topology(Settings::default(), *routers, *extra_links, *seed)?;
            run(&cli, config).await?;
        }
        Commands::Show { topology } => {
            let config = TopologyConfig::load(topology)
                .with_context(|| format!("loading {}", topology.display()))?;
            show(&config);
        }
        Commands::Generate {
            shape,
            routers,
            seed,
            output,
        } => {
            let builder = TopologyBuilder::new(*routers).with_seed(*seed);
            let config = match shape {
                Shape::Line => builder.line()?,
                Shape::Ring => builder.ring()?,
                Shape::Random => builder.random(0.3)?,
            };
            let rendered = config.to_toml()?;
            match output {
                Some(path) => {
                    std::fs::write(path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "Topology written");
                }
                None => print!("{}", rendered),
            }
        }
    }

    Ok(())
}
