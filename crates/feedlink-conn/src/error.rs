//! Connection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("Connection failed: {0}")]
    EstablishFailed(String),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Health probe failed: {0}")]
    ProbeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConnResult<T> = Result<T, ConnError>;
