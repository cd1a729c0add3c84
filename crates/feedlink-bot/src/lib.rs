//! Feedlink service binary support.
//!
//! Wires the connection lifecycle, the Redis market store, and the
//! telemetry stack into a runnable service plus operator CLI.

pub mod config;
pub mod error;
pub mod link;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use link::RedisLink;
