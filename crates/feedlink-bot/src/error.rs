//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Conn(#[from] feedlink_conn::ConnError),

    #[error("Store error: {0}")]
    Store(#[from] feedlink_store::StoreError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] feedlink_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
