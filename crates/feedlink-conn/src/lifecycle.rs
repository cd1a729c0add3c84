//! The reconnect state machine for one logical connection.
//!
//! Owns connect/retry/health-check/shutdown orchestration. Each
//! lifecycle instance runs at most one reconnection attempt and at most
//! one health-monitor task at any time; every state change flows
//! through [`ConnectionLifecycle::transition_state`], the single
//! mutation point.

use crate::broadcast::{update_for, StateBroadcaster};
use crate::error::{ConnError, ConnResult};
use crate::probe::{Establisher, HealthProbe};
use feedlink_core::{compute_backoff_delay, BackoffParameters, ConnectionMetrics, ConnectionState};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle configuration.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Reconnection backoff parameters (including the retry ceiling).
    pub backoff: BackoffParameters,
    /// Interval between health probes while Ready/Degraded.
    pub probe_interval: Duration,
    /// Bound on a single probe; a timed-out probe counts as failed.
    pub probe_timeout: Duration,
    /// Consecutive failed probes before forcing a reconnect.
    pub max_probe_failures: u32,
    /// Bound on waiting for background tasks during shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffParameters::default(),
            probe_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            max_probe_failures: 3,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Reconnect state machine for one logical connection.
pub struct ConnectionLifecycle {
    service_name: String,
    config: LifecycleConfig,
    state: RwLock<ConnectionState>,
    metrics: RwLock<ConnectionMetrics>,
    broadcaster: Arc<StateBroadcaster>,
    /// Serializes reconnection attempts (at most one active at a time).
    reconnect_gate: TokioMutex<()>,
    reconnect_task: TokioMutex<Option<JoinHandle<()>>>,
    health_task: TokioMutex<Option<JoinHandle<()>>>,
    health_token: RwLock<CancellationToken>,
    shutdown_token: CancellationToken,
}

impl ConnectionLifecycle {
    /// Create a lifecycle for one service's connection.
    pub fn new(
        service_name: impl Into<String>,
        config: LifecycleConfig,
        broadcaster: Arc<StateBroadcaster>,
    ) -> Self {
        let shutdown_token = CancellationToken::new();
        Self {
            service_name: service_name.into(),
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            metrics: RwLock::new(ConnectionMetrics::default()),
            broadcaster,
            reconnect_gate: TokioMutex::new(()),
            reconnect_task: TokioMutex::new(None),
            health_task: TokioMutex::new(None),
            health_token: RwLock::new(shutdown_token.child_token()),
            shutdown_token,
        }
    }

    /// Service this connection belongs to.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Snapshot of the reconnection metrics.
    pub fn metrics(&self) -> ConnectionMetrics {
        self.metrics.read().clone()
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Transition to a new state.
    ///
    /// The only place the state changes; broadcasts the transition with
    /// a metrics snapshot. A broadcast failure can never prevent the
    /// transition from completing.
    pub fn transition_state(&self, new_state: ConnectionState, error_context: Option<String>) {
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, new_state)
        };

        if previous != new_state {
            info!(
                service = %self.service_name,
                from = %previous,
                to = %new_state,
                error_context = error_context.as_deref().unwrap_or(""),
                "Connection state changed"
            );
        }

        self.broadcaster
            .broadcast(update_for(self, new_state, error_context));
    }

    /// Attempt connection with exponential backoff retry.
    ///
    /// Loops until `establish` succeeds, shutdown is requested (the
    /// backoff sleep is cancellation-aware, and cancellation does not
    /// count as a failure), or the retry ceiling is exhausted. With
    /// `max_consecutive_failures = K` and a permanently failing
    /// establisher, exactly K attempts are made before the terminal
    /// `Failed` transition.
    pub async fn connect_with_retry<E: Establisher>(&self, establisher: &E) -> ConnResult<()> {
        let _gate = self.reconnect_gate.lock().await;

        self.transition_state(ConnectionState::Connecting, None);

        loop {
            if self.is_shutdown() {
                info!(service = %self.service_name, "Shutdown requested, exiting connect loop");
                self.transition_state(ConnectionState::Disconnected, None);
                return Ok(());
            }

            match establisher.establish().await {
                Ok(()) => {
                    self.metrics.write().record_connect();
                    self.transition_state(ConnectionState::Connected, None);
                    info!(service = %self.service_name, "Connection established");
                    return Ok(());
                }
                Err(e) => {
                    let failures = {
                        let mut metrics = self.metrics.write();
                        metrics.record_failure();
                        metrics.consecutive_failures
                    };

                    let ceiling = self.config.backoff.max_consecutive_failures;
                    if ceiling > 0 && failures >= ceiling {
                        error!(
                            service = %self.service_name,
                            attempts = failures,
                            error = %e,
                            "Max consecutive failures reached, giving up"
                        );
                        self.transition_state(
                            ConnectionState::Failed,
                            Some(format!("retries exhausted: {e}")),
                        );
                        return Err(ConnError::RetriesExhausted {
                            attempts: failures,
                            last_error: e.to_string(),
                        });
                    }

                    // failures - 1 so the first retry waits the initial delay.
                    let delay = {
                        let mut rng = rand::thread_rng();
                        compute_backoff_delay(failures - 1, &self.config.backoff, &mut rng)
                    };
                    self.metrics.write().current_backoff_delay = delay;

                    warn!(
                        service = %self.service_name,
                        attempt = failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connect failed, retrying after backoff"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.shutdown_token.cancelled() => {
                            info!(
                                service = %self.service_name,
                                "Shutdown requested during backoff, exiting"
                            );
                            self.transition_state(ConnectionState::Disconnected, None);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// Caller confirmation that authentication completed.
    pub fn mark_authenticated(&self) {
        self.transition_state(ConnectionState::Authenticated, None);
    }

    /// Caller confirmation that auth/subscribe completed; data may flow.
    pub fn mark_ready(&self) {
        self.transition_state(ConnectionState::Ready, None);
    }

    /// Spawn the reconnect loop as a background task.
    ///
    /// Idempotent: a running task is left alone, a finished one is
    /// replaced.
    pub async fn start_reconnection<E>(self: &Arc<Self>, establisher: Arc<E>)
    where
        E: Establisher + 'static,
    {
        let mut guard = self.reconnect_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                debug!(service = %self.service_name, "Reconnection task already running");
                return;
            }
        }

        let lifecycle = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            if let Err(e) = lifecycle.connect_with_retry(establisher.as_ref()).await {
                error!(
                    service = %lifecycle.service_name,
                    error = %e,
                    "Reconnection task ended with error"
                );
            }
        }));
    }

    /// Spawn the background health-monitor loop.
    ///
    /// Idempotent: calling while a monitor is already running is a
    /// no-op. Probes only run while the connection is Ready/Degraded.
    pub async fn start_health_monitoring<P, E>(
        self: &Arc<Self>,
        probe: Arc<P>,
        establisher: Arc<E>,
    ) where
        P: HealthProbe + 'static,
        E: Establisher + 'static,
    {
        let mut guard = self.health_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                debug!(service = %self.service_name, "Health monitor already running");
                return;
            }
        }

        let token = self.shutdown_token.child_token();
        *self.health_token.write() = token.clone();

        let lifecycle = Arc::clone(self);
        *guard = Some(tokio::spawn(async move {
            lifecycle.health_loop(probe, establisher, token).await;
        }));
        info!(service = %self.service_name, "Health monitoring started");
    }

    async fn health_loop<P, E>(
        self: Arc<Self>,
        probe: Arc<P>,
        establisher: Arc<E>,
        token: CancellationToken,
    ) where
        P: HealthProbe,
        E: Establisher,
    {
        let mut consecutive_probe_failures = 0u32;

        loop {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(service = %self.service_name, "Health monitor stopped");
                    return;
                }
                () = tokio::time::sleep(self.config.probe_interval) => {}
            }

            if !self.state().is_operational() {
                continue;
            }

            let healthy =
                match tokio::time::timeout(self.config.probe_timeout, probe.probe()).await {
                    Ok(Ok(healthy)) => healthy,
                    Ok(Err(e)) => {
                        warn!(service = %self.service_name, error = %e, "Health probe error");
                        false
                    }
                    Err(_) => {
                        warn!(
                            service = %self.service_name,
                            timeout_ms = self.config.probe_timeout.as_millis() as u64,
                            "Health probe timed out"
                        );
                        false
                    }
                };

            if healthy {
                consecutive_probe_failures = 0;
                if self.state() == ConnectionState::Degraded {
                    self.transition_state(ConnectionState::Ready, None);
                }
                continue;
            }

            consecutive_probe_failures += 1;
            if self.state() == ConnectionState::Ready {
                self.transition_state(
                    ConnectionState::Degraded,
                    Some(format!(
                        "health probe failed ({consecutive_probe_failures} consecutive)"
                    )),
                );
            }

            if consecutive_probe_failures >= self.config.max_probe_failures {
                warn!(
                    service = %self.service_name,
                    failures = consecutive_probe_failures,
                    "Probe failure limit reached, forcing reconnect"
                );
                consecutive_probe_failures = 0;
                self.transition_state(
                    ConnectionState::Disconnected,
                    Some("probe failure limit reached".to_string()),
                );

                match self.connect_with_retry(establisher.as_ref()).await {
                    Ok(()) => {
                        // The establisher re-runs the full handshake, so a
                        // fresh Connected state is immediately operational.
                        if self.state() == ConnectionState::Connected {
                            self.mark_ready();
                        }
                    }
                    Err(e) => {
                        error!(
                            service = %self.service_name,
                            error = %e,
                            "Reconnect after failed probes exhausted retries"
                        );
                        return;
                    }
                }
            }
        }
    }

    /// Whether the health-monitor task is currently running.
    pub async fn health_monitoring_active(&self) -> bool {
        self.health_task
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the health monitor and await its termination.
    pub async fn stop_health_monitoring(&self) {
        self.health_token.read().cancel();
        let handle = self.health_task.lock().await.take();
        if let Some(handle) = handle {
            self.await_task("health monitor", handle).await;
        }
    }

    /// Graceful shutdown: cancel background tasks and await them.
    ///
    /// Blocks (bounded by the shutdown timeout per task) until both the
    /// reconnect loop and the health monitor have observably stopped.
    /// Errors during shutdown are logged and swallowed; a second call
    /// is a safe no-op. Safe to call from any state, including
    /// mid-reconnect.
    pub async fn shutdown(&self) {
        if self.is_shutdown() {
            debug!(service = %self.service_name, "Shutdown already requested");
            return;
        }

        self.transition_state(ConnectionState::ShuttingDown, None);
        self.shutdown_token.cancel();

        let health = self.health_task.lock().await.take();
        if let Some(handle) = health {
            self.await_task("health monitor", handle).await;
        }

        let reconnect = self.reconnect_task.lock().await.take();
        if let Some(handle) = reconnect {
            self.await_task("reconnection task", handle).await;
        }

        self.transition_state(ConnectionState::Disconnected, None);
        info!(service = %self.service_name, "Shutdown complete");
    }

    async fn await_task(&self, name: &str, mut handle: JoinHandle<()>) {
        match tokio::time::timeout(self.config.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(service = %self.service_name, task = name, error = %e, "Task join error");
            }
            Err(_) => {
                warn!(
                    service = %self.service_name,
                    task = name,
                    timeout_ms = self.config.shutdown_timeout.as_millis() as u64,
                    "Task did not stop within shutdown timeout, aborting"
                );
                handle.abort();
            }
        }
    }
}
