//! Core domain types for the feedlink market data mesh.
//!
//! Pure types shared by every other crate:
//! - Connection state machine vocabulary and metrics
//! - Exponential backoff computation with injectable jitter
//! - The closed set of recognized pricing algorithms
//! - Trade direction derivation from theoretical vs quoted prices

pub mod algo;
pub mod backoff;
pub mod direction;
pub mod error;
pub mod metrics;
pub mod state;

pub use algo::Algo;
pub use backoff::{compute_backoff_delay, BackoffParameters};
pub use direction::{compute_direction, Direction};
pub use error::{CoreError, Result};
pub use metrics::ConnectionMetrics;
pub use state::ConnectionState;
