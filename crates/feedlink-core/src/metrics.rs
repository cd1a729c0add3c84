//! Per-connection reconnection metrics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Counters owned and mutated only by the connection lifecycle.
///
/// `consecutive_failures` resets to 0 only on a confirmed successful
/// connect, never on shutdown or cancellation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    /// Failures since the last successful connect.
    pub consecutive_failures: u32,
    /// Reconnection attempts over the lifetime of the instance.
    pub total_reconnection_attempts: u64,
    /// Successful connects over the lifetime of the instance.
    pub total_connections: u64,
    /// Backoff delay chosen for the most recent retry.
    pub current_backoff_delay: Duration,
}

impl ConnectionMetrics {
    /// Record a failed connection attempt.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        self.total_reconnection_attempts += 1;
    }

    /// Record a confirmed successful connect.
    pub fn record_connect(&mut self) {
        self.consecutive_failures = 0;
        self.current_backoff_delay = Duration::ZERO;
        self.total_connections += 1;
    }
}
