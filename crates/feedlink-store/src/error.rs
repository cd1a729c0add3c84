//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Invalid service prefix: {0} (expected 'ws' or 'rest')")]
    InvalidServicePrefix(String),

    #[error("Value parse error: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] feedlink_core::CoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
