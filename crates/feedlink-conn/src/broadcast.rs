//! State broadcasting to the shared status store and local callbacks.
//!
//! Broadcasting must never block or fail the state machine: the shared
//! store write goes through a bounded channel to a background writer
//! task (overflow drops the update with a warning), and sink errors are
//! logged and suppressed. Local callbacks always run.

use crate::lifecycle::ConnectionLifecycle;
use chrono::{DateTime, Utc};
use feedlink_core::{ConnectionMetrics, ConnectionState};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Snapshot of one connection's state and metrics at a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub service: String,
    pub state: ConnectionState,
    pub metrics: ConnectionMetrics,
    pub error_context: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Destination for status updates in the shared store.
pub trait StatusSink: Send + Sync {
    fn record(&self, update: &StatusUpdate) -> impl Future<Output = anyhow::Result<()>> + Send;
}

type StateCallback = Box<dyn Fn(&StatusUpdate) + Send + Sync>;

/// Fan-out point for connection state transitions.
///
/// Holds zero or more local callbacks (supervisor notification,
/// metrics, logging) and an optional sender to a status-writer task.
pub struct StateBroadcaster {
    callbacks: RwLock<Vec<StateCallback>>,
    sink_tx: Option<mpsc::Sender<StatusUpdate>>,
}

impl StateBroadcaster {
    /// Broadcaster with local callbacks only.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            sink_tx: None,
        }
    }

    /// Broadcaster that additionally forwards updates to a status writer.
    pub fn with_sink(sink_tx: mpsc::Sender<StatusUpdate>) -> Self {
        Self {
            callbacks: RwLock::new(Vec::new()),
            sink_tx: Some(sink_tx),
        }
    }

    /// Register a local callback invoked on every broadcast.
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(&StatusUpdate) + Send + Sync + 'static,
    {
        self.callbacks.write().push(Box::new(callback));
    }

    /// Publish a state transition.
    ///
    /// Never blocks: the store write is a `try_send`, and callbacks run
    /// regardless of whether it succeeded.
    pub fn broadcast(&self, update: StatusUpdate) {
        if let Some(tx) = &self.sink_tx {
            if let Err(e) = tx.try_send(update.clone()) {
                warn!(
                    service = %update.service,
                    error = %e,
                    "Status channel full or closed, dropping update"
                );
            }
        }

        for callback in self.callbacks.read().iter() {
            callback(&update);
        }
    }
}

impl Default for StateBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the background task that drains status updates into a sink.
///
/// Returns the sender to hand to [`StateBroadcaster::with_sink`] and
/// the task handle. Sink failures are logged and suppressed; losing a
/// status write must never affect connection behavior.
pub fn spawn_status_writer<S>(
    sink: S,
    buffer: usize,
    token: CancellationToken,
) -> (mpsc::Sender<StatusUpdate>, JoinHandle<()>)
where
    S: StatusSink + 'static,
{
    let (tx, mut rx) = mpsc::channel::<StatusUpdate>(buffer);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                update = rx.recv() => {
                    let Some(update) = update else { break };
                    if let Err(e) = sink.record(&update).await {
                        warn!(
                            service = %update.service,
                            error = %e,
                            "Failed to write connection status"
                        );
                    }
                }
            }
        }
        debug!("Status writer stopped");
    });

    (tx, handle)
}

/// Build a status update from the lifecycle's current snapshot.
pub(crate) fn update_for(
    lifecycle: &ConnectionLifecycle,
    state: ConnectionState,
    error_context: Option<String>,
) -> StatusUpdate {
    StatusUpdate {
        service: lifecycle.service_name().to_string(),
        state,
        metrics: lifecycle.metrics(),
        error_context,
        timestamp: Utc::now(),
    }
}
