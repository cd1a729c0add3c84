//! Redis link monitored by the connection lifecycle.
//!
//! Establishing opens a fresh connection manager and stashes it;
//! probing is a PING on the stashed connection. Consumers grab a
//! backend clone via [`RedisLink::backend`] after the lifecycle
//! reports Ready.

use feedlink_conn::{ConnError, ConnResult, Establisher, HealthProbe};
use feedlink_store::RedisBackend;
use parking_lot::RwLock;

pub struct RedisLink {
    url: String,
    backend: RwLock<Option<RedisBackend>>,
}

impl RedisLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backend: RwLock::new(None),
        }
    }

    /// Current backend, if a connection has been established.
    pub fn backend(&self) -> Option<RedisBackend> {
        self.backend.read().clone()
    }
}

impl Establisher for RedisLink {
    async fn establish(&self) -> ConnResult<()> {
        let backend = RedisBackend::connect(&self.url)
            .await
            .map_err(|e| ConnError::EstablishFailed(e.to_string()))?;
        // A manager can be created for an unreachable server; the ping
        // proves the link is actually up.
        backend
            .ping()
            .await
            .map_err(|e| ConnError::EstablishFailed(e.to_string()))?;
        *self.backend.write() = Some(backend);
        Ok(())
    }
}

impl HealthProbe for RedisLink {
    async fn probe(&self) -> ConnResult<bool> {
        let Some(backend) = self.backend() else {
            return Ok(false);
        };
        Ok(backend.ping().await.is_ok())
    }
}
