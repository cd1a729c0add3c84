//! Redis-backed shared market state.
//!
//! The single Redis instance is the coordination point for every
//! process in the mesh:
//! - `OwnershipArbiter`: optimistic single-writer protocol over each
//!   market's theoretical-price fields, with daily rejection accounting
//! - `SubscriptionRegistry`: which markets each service wants streamed,
//!   plus exchange-assigned subscription-ID bookkeeping
//! - `RedisStatusStore`: connection state/metrics sink for dashboards
//!
//! All operations go through the [`RedisOps`] trait; each trait method
//! maps to exactly one Redis command, which is what the arbitration
//! protocol's atomicity relies on.

pub mod arbiter;
pub mod backend;
pub mod error;
pub mod keys;
pub mod status;
pub mod subscriptions;

#[cfg(test)]
pub(crate) mod memory;

pub use arbiter::{BatchUpdateOutcome, MarketUpdateResult, OwnershipArbiter, SignalUpdate};
pub use backend::{HashWrite, RedisBackend, RedisOps};
pub use error::{StoreError, StoreResult};
pub use status::{read_connection_status, ConnectionStatus, RedisStatusStore};
pub use subscriptions::SubscriptionRegistry;
