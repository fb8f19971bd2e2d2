//! Node lifecycle
//!
//! Every active element of the network (router, host, link layer) implements
//! [`Node`] and is driven by [`run`]: the loop checks a shared
//! [`StopSignal`] once per iteration, calls [`Node::step`], and backs off
//! briefly when a step found nothing to do. [`spawn`] runs a node on its own
//! tokio task and hands back a [`NodeHandle`] whose `join` returns the node,
//! so its final state can be inspected after shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::{JoinError, JoinHandle};
use tracing::{Instrument, debug, info_span};

/// Default pause after a step that did no work
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Cooperative stop flag shared between a node and whoever controls it
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every node watching this signal to stop after its current step
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An independently running network element
#[async_trait]
pub trait Node: Send + 'static {
    /// Identifier used in log spans
    fn name(&self) -> String;

    /// Called once before the first step
    async fn on_start(&mut self) {}

    /// Do one round of work and report how many items were handled
    async fn step(&mut self) -> usize;

    /// Pause after a step that returned zero
    fn idle_backoff(&self) -> Duration {
        DEFAULT_IDLE_BACKOFF
    }
}

/// Drive a node until `stop` is raised, then give it back
pub async fn run<N: Node>(mut node: N, stop: StopSignal) -> N {
    let span = info_span!("node", id = %node.name());
    async move {
        debug!("Node starting");
        node.on_start().await;

        let mut steps: u64 = 0;
        while !stop.is_stopped() {
            let handled = node.step().await;
            steps += 1;
            if handled == 0 {
                tokio::time::sleep(node.idle_backoff()).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        debug!(steps, "Node stopped");
        node
    }
    .instrument(span)
    .await
}

/// Handle to a node running on its own task
#[derive(Debug)]
pub struct NodeHandle<N> {
    name: String,
    stop: StopSignal,
    task: JoinHandle<N>,
}

impl<N: Node> NodeHandle<N> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise the stop signal without waiting
    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Check if the task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the node to exit and recover it
    pub async fn join(self) -> Result<N, JoinError> {
        self.task.await
    }

    /// Stop the node and recover it
    pub async fn stop(self) -> Result<N, JoinError> {
        self.request_stop();
        self.join().await
    }
}

/// Run a node on a new task with its own stop signal
pub fn spawn<N: Node>(node: N) -> NodeHandle<N> {
    spawn_with(node, StopSignal::new())
}

/// Run a node on a new task watching a shared stop signal
pub fn spawn_with<N: Node>(node: N, stop: StopSignal) -> NodeHandle<N> {
    let name = node.name();
    let task = tokio::spawn(run(node, stop.clone()));
    NodeHandle { name, stop, task }
}
