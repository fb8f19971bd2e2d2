//! End-to-end tests running every node as its own task
//!
//! Each test starts a full network on the multi-threaded runtime, waits for
//! quiescence and checks the stopped routers against shortest paths.

use std::path::PathBuf;
use std::time::Duration;

use bellhop_core::NodeId;
use bellhop_routing::AdvertisePolicy;
use bellhop_simulation::{
    Network, ScenarioOptions, Settings, TopologyBuilder, TopologyConfig, random_topology,
    run_scenario,
};

fn id(s: &str) -> NodeId {
    NodeId::new(s).unwrap()
}

fn campus_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("topologies/campus.toml")
}

fn options() -> ScenarioOptions {
    ScenarioOptions::default()
        .with_messages(2)
        .with_quiet(Duration::from_millis(60))
        .with_timeout(Duration::from_secs(30))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_campus_topology_converges_and_delivers() {
    bellhop_logging::init_testing();
    let config = TopologyConfig::load(&campus_path()).unwrap();
    let report = run_scenario(&config, &options()).await.unwrap();

    assert!(report.is_converged(), "{}", report);
    for host in ["H1", "H2", "H3"] {
        assert_eq!(report.inbox(&id(host)).len(), 4, "inbox of {}", host);
    }

    // The expensive direct link is never used for data
    let ra = report.router(&id("RA")).unwrap();
    assert_eq!(ra.table().best_cost(&id("H2")), Some(9));
    assert_eq!(ra.table().best_cost(&id("RE")), Some(8));
    assert_eq!(report.router(&id("RC")).unwrap().stats().forwarded, 8);
    assert_eq!(report.link_stats().dropped, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_topologies_match_shortest_paths() {
    bellhop_logging::init_testing();
    for seed in 1..=3 {
        let config = random_topology(Settings::default(), 7, 0.3, seed).unwrap();
        let report = run_scenario(&config, &options()).await.unwrap();
        assert!(report.is_converged(), "seed {}:\n{}", seed, report);
        assert_eq!(report.inbox(&id("H2")).len(), 2, "seed {}", seed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_improvement_policy_converges_to_same_costs() {
    let settings = Settings {
        advertise_policy: AdvertisePolicy::EveryImprovement,
        ..Settings::default()
    };
    let config = TopologyBuilder::new(5)
        .with_settings(settings)
        .with_cost_range(1..=9)
        .with_seed(11)
        .ring()
        .unwrap();
    let report = run_scenario(&config, &options()).await.unwrap();
    assert!(report.is_converged(), "{}", report);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readvertise_interval_still_converges() {
    let settings = Settings {
        readvertise_interval_ms: Some(20),
        ..Settings::default()
    };
    let config = TopologyBuilder::new(4)
        .with_settings(settings)
        .with_seed(3)
        .random(0.5)
        .unwrap();
    let options = options().with_quiet(Duration::from_millis(150));
    let report = run_scenario(&config, &options).await.unwrap();
    assert!(report.is_converged(), "{}", report);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rendered_topology_loads_back() {
    let config = TopologyBuilder::new(4).with_seed(5).line().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("line.toml");
    std::fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = TopologyConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let running = Network::from_config(&loaded).unwrap().start();
    running
        .settle(Duration::from_millis(60), Duration::from_secs(30))
        .await
        .unwrap();
    let report = running.shutdown().await.unwrap();
    assert!(report.is_converged(), "{}", report);
    assert!(report.link_stats().moved > 0);
}

#[test]
fn test_missing_file_is_reported() {
    let err = TopologyConfig::load(&PathBuf::from("/nonexistent/bellhop.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/bellhop.toml"));
}
