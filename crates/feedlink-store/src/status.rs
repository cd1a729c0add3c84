//! Connection status persistence for the monitoring surface.
//!
//! Each service's latest connection snapshot lives in a Redis hash at
//! `monitoring:connection:{service}`; dashboards and the `status` CLI
//! read it back without talking to the service itself.

use crate::backend::RedisOps;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use feedlink_conn::{StatusSink, StatusUpdate};
use feedlink_core::ConnectionState;
use std::str::FromStr;
use tracing::debug;

const FIELD_STATE: &str = "state";
const FIELD_ERROR_CONTEXT: &str = "error_context";
const FIELD_CONSECUTIVE_FAILURES: &str = "consecutive_failures";
const FIELD_RECONNECTION_ATTEMPTS: &str = "total_reconnection_attempts";
const FIELD_TOTAL_CONNECTIONS: &str = "total_connections";
const FIELD_BACKOFF_MS: &str = "current_backoff_ms";
const FIELD_UPDATED_AT: &str = "updated_at";

/// Writes connection status snapshots into the shared store.
#[derive(Clone)]
pub struct RedisStatusStore<C: RedisOps> {
    redis: C,
}

impl<C: RedisOps> RedisStatusStore<C> {
    pub fn new(redis: C) -> Self {
        Self { redis }
    }
}

impl<C: RedisOps> StatusSink for RedisStatusStore<C> {
    async fn record(&self, update: &StatusUpdate) -> anyhow::Result<()> {
        let key = keys::connection_status_key(&update.service);
        let entries = vec![
            (FIELD_STATE.to_string(), update.state.as_str().to_string()),
            (
                FIELD_ERROR_CONTEXT.to_string(),
                update.error_context.clone().unwrap_or_default(),
            ),
            (
                FIELD_CONSECUTIVE_FAILURES.to_string(),
                update.metrics.consecutive_failures.to_string(),
            ),
            (
                FIELD_RECONNECTION_ATTEMPTS.to_string(),
                update.metrics.total_reconnection_attempts.to_string(),
            ),
            (
                FIELD_TOTAL_CONNECTIONS.to_string(),
                update.metrics.total_connections.to_string(),
            ),
            (
                FIELD_BACKOFF_MS.to_string(),
                update.metrics.current_backoff_delay.as_millis().to_string(),
            ),
            (FIELD_UPDATED_AT.to_string(), update.timestamp.to_rfc3339()),
        ];
        self.redis.hash_set(&key, &entries).await?;
        debug!(service = %update.service, state = %update.state, "Recorded connection status");
        Ok(())
    }
}

/// Status snapshot as stored, for read-side consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub error_context: Option<String>,
    pub consecutive_failures: u32,
    pub total_reconnection_attempts: u64,
    pub total_connections: u64,
    pub current_backoff_ms: u64,
    pub updated_at: String,
}

/// Read a service's last recorded status; `None` if it never reported.
pub async fn read_connection_status<C: RedisOps>(
    redis: &C,
    service: &str,
) -> StoreResult<Option<ConnectionStatus>> {
    let data = redis
        .hash_get_all(&keys::connection_status_key(service))
        .await?;
    if data.is_empty() {
        return Ok(None);
    }

    let state_raw = data
        .get(FIELD_STATE)
        .ok_or_else(|| StoreError::Parse(format!("status hash for {service} missing state")))?;
    let state = ConnectionState::from_str(state_raw)
        .map_err(|_| StoreError::Parse(format!("unknown connection state {state_raw:?}")))?;

    let counter = |field: &str| data.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);

    Ok(Some(ConnectionStatus {
        state,
        error_context: data
            .get(FIELD_ERROR_CONTEXT)
            .filter(|v| !v.is_empty())
            .cloned(),
        consecutive_failures: data
            .get(FIELD_CONSECUTIVE_FAILURES)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        total_reconnection_attempts: counter(FIELD_RECONNECTION_ATTEMPTS),
        total_connections: counter(FIELD_TOTAL_CONNECTIONS),
        current_backoff_ms: counter(FIELD_BACKOFF_MS),
        updated_at: data.get(FIELD_UPDATED_AT).cloned().unwrap_or_default(),
    }))
}
