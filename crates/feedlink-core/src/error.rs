//! Error types for feedlink-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown algorithm: {0}")]
    UnknownAlgo(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
