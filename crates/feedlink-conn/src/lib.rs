//! Connection resilience for upstream data sources.
//!
//! Provides robust connectivity for every external feed (WebSocket,
//! REST poller, scraper) without duplicating the logic per connection
//! type:
//! - Automatic reconnection with bounded, jittered exponential backoff
//! - Periodic health probing with Ready/Degraded demotion and forced
//!   reconnect after repeated probe failures
//! - Cancellation-safe graceful shutdown
//! - State broadcasting to a shared status store and local callbacks

pub mod broadcast;
pub mod error;
pub mod lifecycle;
pub mod probe;

pub use broadcast::{spawn_status_writer, StateBroadcaster, StatusSink, StatusUpdate};
pub use error::{ConnError, ConnResult};
pub use lifecycle::{ConnectionLifecycle, LifecycleConfig};
pub use probe::{Establisher, HealthProbe};
