//! Prometheus metrics for feedlink services.
//!
//! Covers the two operational surfaces:
//! - Connection lifecycle (state, reconnects, probe failures)
//! - Ownership arbitration (rejected writes by algo pair)
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use feedlink_core::ConnectionState;
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, GaugeVec};

const ALL_STATES: [ConnectionState; 8] = [
    ConnectionState::Disconnected,
    ConnectionState::Connecting,
    ConnectionState::Connected,
    ConnectionState::Authenticated,
    ConnectionState::Ready,
    ConnectionState::Degraded,
    ConnectionState::ShuttingDown,
    ConnectionState::Failed,
];

/// Connection state machine current state.
/// Labels: service, state (1=active, 0=inactive).
pub static CONNECTION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "feedlink_connection_state",
        "Connection state machine current state (1=active, 0=inactive)",
        &["service", "state"]
    )
    .unwrap()
});

/// Total reconnection attempts per service.
pub static RECONNECT_ATTEMPTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedlink_reconnect_attempts_total",
        "Total reconnection attempts",
        &["service"]
    )
    .unwrap()
});

/// Total failed health probes per service.
pub static PROBE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedlink_probe_failures_total",
        "Total failed health probes",
        &["service"]
    )
    .unwrap()
});

/// Market updates rejected by the ownership arbiter.
/// Labels: requesting algo, owning algo.
pub static OWNERSHIP_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "feedlink_ownership_rejections_total",
        "Market updates rejected because another algo owns the market",
        &["requesting", "owning"]
    )
    .unwrap()
});

/// Helper struct for recording metrics.
pub struct Metrics;

impl Metrics {
    /// Set the connection state gauge for a service.
    /// Only the active state is set to 1, all others to 0.
    pub fn connection_state_set(service: &str, state: ConnectionState) {
        for s in ALL_STATES {
            CONNECTION_STATE
                .with_label_values(&[service, s.as_str()])
                .set(if s == state { 1.0 } else { 0.0 });
        }
    }

    pub fn reconnect_attempt(service: &str) {
        RECONNECT_ATTEMPTS_TOTAL.with_label_values(&[service]).inc();
    }

    pub fn probe_failure(service: &str) {
        PROBE_FAILURES_TOTAL.with_label_values(&[service]).inc();
    }
}
