// ── Runtime tuning for the store and the poller ──
//
// Plain values handed in by the embedding application. Core never
// reads files or environment variables; hubpanel-config does that.

use std::time::Duration;

/// Shortest cadence the poller will honor.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How the [`ConfigStore`](crate::ConfigStore) talks to the settings server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Key the remote document is stored under (panel/user identity).
    pub identity: String,
    /// Upper bound for one remote read or write.
    pub remote_timeout: Duration,
}

impl StoreConfig {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Self::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            identity: "default".into(),
            remote_timeout: Duration::from_secs(10),
        }
    }
}

/// Scheduling knobs for the [`EntityPoller`](crate::EntityPoller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Cadence used when a subscriber does not ask for one.
    pub default_interval: Duration,
    /// Ids falling due within this window of the earliest one join its cycle.
    pub batch_window: Duration,
    /// How often unused entities are marked and evicted.
    pub sweep_interval: Duration,
    /// Consecutive failures tolerated before the interval starts doubling.
    pub backoff_after: u32,
    /// Upper bound for a backed-off interval.
    pub max_backoff: Duration,
    /// Upper bound for one fetch (single or batched).
    pub fetch_timeout: Duration,
    /// Slots in the snapshot broadcast channel before slow readers lag.
    pub update_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_secs(5),
            batch_window: Duration::from_millis(50),
            sweep_interval: Duration::from_secs(30),
            backoff_after: 3,
            max_backoff: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
            update_capacity: 256,
        }
    }
}
