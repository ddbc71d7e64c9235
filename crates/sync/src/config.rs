//! Timing configuration for the sync layer.

use std::time::Duration;

/// Intervals and delays governing the sync loops.
///
/// Defaults match the production gateway contract; tests shrink them to
/// keep socket-driven cases fast.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Fixed delay before a reconnection attempt after an abnormal closure.
    pub reconnect_delay: Duration,
    /// Dashboard poll cadence while the push channel is connected.
    pub poll_interval_connected: Duration,
    /// Dashboard poll cadence while the push channel is down.
    pub poll_interval_disconnected: Duration,
    /// Status poll cadence for the transaction detail view.
    pub detail_poll_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(3000),
            poll_interval_connected: Duration::from_millis(30_000),
            poll_interval_disconnected: Duration::from_millis(5000),
            detail_poll_interval: Duration::from_millis(3000),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `TALLY_RECONNECT_MS`         | `3000`  |
    /// | `TALLY_POLL_CONNECTED_MS`    | `30000` |
    /// | `TALLY_POLL_DISCONNECTED_MS` | `5000`  |
    /// | `TALLY_DETAIL_POLL_MS`       | `3000`  |
    pub fn from_env() -> Self {
        let reconnect_ms: u64 = std::env::var("TALLY_RECONNECT_MS")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("TALLY_RECONNECT_MS must be a millisecond count");

        let connected_ms: u64 = std::env::var("TALLY_POLL_CONNECTED_MS")
            .unwrap_or_else(|_| "30000".into())
            .parse()
            .expect("TALLY_POLL_CONNECTED_MS must be a millisecond count");

        let disconnected_ms: u64 = std::env::var("TALLY_POLL_DISCONNECTED_MS")
            .unwrap_or_else(|_| "5000".into())
            .parse()
            .expect("TALLY_POLL_DISCONNECTED_MS must be a millisecond count");

        let detail_ms: u64 = std::env::var("TALLY_DETAIL_POLL_MS")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("TALLY_DETAIL_POLL_MS must be a millisecond count");

        Self {
            reconnect_delay: Duration::from_millis(reconnect_ms),
            poll_interval_connected: Duration::from_millis(connected_ms),
            poll_interval_disconnected: Duration::from_millis(disconnected_ms),
            detail_poll_interval: Duration::from_millis(detail_ms),
        }
    }
}
