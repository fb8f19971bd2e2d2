//! Router configuration

use std::time::Duration;

use bellhop_core::{DEFAULT_IDLE_BACKOFF, QueueCapacity};
use serde::{Deserialize, Serialize};

/// When a router re-broadcasts after its table improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvertisePolicy {
    /// One full broadcast per improved entry
    EveryImprovement,
    /// One broadcast per received update, however many entries improved
    #[default]
    OncePerUpdate,
}

/// Configuration for a router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Capacity of every interface queue
    pub queue_capacity: QueueCapacity,
    /// How long a blocking put waits for room; `None` waits forever
    pub put_timeout: Option<Duration>,
    /// Pause after an iteration that found no packets
    pub idle_backoff: Duration,
    /// Re-broadcast behavior after an improvement
    pub advertise_policy: AdvertisePolicy,
    /// Minimum spacing between broadcasts; deferred ones are flushed later
    pub readvertise_interval: Option<Duration>,
    /// Broadcast the seeded table when the loop starts
    pub advertise_on_start: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: QueueCapacity::Unbounded,
            put_timeout: Some(Duration::from_millis(100)),
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            advertise_policy: AdvertisePolicy::default(),
            readvertise_interval: None,
            advertise_on_start: true,
        }
    }
}

impl RouterConfig {
    pub fn with_queue_capacity(mut self, capacity: QueueCapacity) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_put_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.put_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_advertise_policy(mut self, policy: AdvertisePolicy) -> Self {
        self.advertise_policy = policy;
        self
    }

    pub fn with_readvertise_interval(mut self, interval: Option<Duration>) -> Self {
        self.readvertise_interval = interval;
        self
    }

    pub fn with_advertise_on_start(mut self, enabled: bool) -> Self {
        self.advertise_on_start = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.queue_capacity, QueueCapacity::Unbounded);
        assert_eq!(config.advertise_policy, AdvertisePolicy::OncePerUpdate);
        assert!(config.advertise_on_start);
        assert!(config.readvertise_interval.is_none());
    }

    #[test]
    fn test_builders() {
        let config = RouterConfig::default()
            .with_queue_capacity(QueueCapacity::bounded(4).unwrap())
            .with_advertise_policy(AdvertisePolicy::EveryImprovement)
            .with_readvertise_interval(Some(Duration::from_millis(50)))
            .with_advertise_on_start(false);
        assert_eq!(config.queue_capacity.limit(), Some(4));
        assert_eq!(config.advertise_policy, AdvertisePolicy::EveryImprovement);
        assert_eq!(config.readvertise_interval, Some(Duration::from_millis(50)));
        assert!(!config.advertise_on_start);
    }
}
