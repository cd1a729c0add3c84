//! Per-connection role traits.
//!
//! Each connection type (exchange WebSocket, REST poller, scraper)
//! supplies one implementation per role; the lifecycle only cares about
//! succeeded vs failed, the structured errors stay opaque here.

use crate::error::ConnResult;
use std::future::Future;

/// Establishes the underlying transport for one logical connection.
///
/// `establish` performs the full handshake the connection needs to be
/// usable again after a drop, including any authentication and
/// re-subscription. Errors are treated as transient and retried with
/// backoff.
pub trait Establisher: Send + Sync {
    fn establish(&self) -> impl Future<Output = ConnResult<()>> + Send;
}

/// Lightweight liveness check for an established connection.
///
/// Distinct from the connect handshake: a probe failure does not close
/// the transport, it demotes the connection to degraded and, repeated,
/// forces a reconnect. Probes run under a bounded timeout so a hung
/// probe cannot block shutdown.
pub trait HealthProbe: Send + Sync {
    fn probe(&self) -> impl Future<Output = ConnResult<bool>> + Send;
}
