//! Bounded, jittered exponential backoff.
//!
//! Jitter spreads reconnect attempts across many connections so a shared
//! upstream outage does not produce a thundering herd of simultaneous
//! reconnects. The random source is injected for deterministic tests.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable backoff configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffParameters {
    /// Delay for the first retry.
    pub initial_delay: Duration,
    /// Growth factor per consecutive failure.
    pub multiplier: f64,
    /// Cap on the uncapped exponential delay.
    pub max_delay: Duration,
    /// Jitter factor range half-width, e.g. 0.2 picks uniformly in [0.8, 1.2].
    pub jitter_ratio: f64,
    /// Retry ceiling; 0 means retry forever.
    pub max_consecutive_failures: u32,
}

impl Default for BackoffParameters {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter_ratio: 0.2,
            max_consecutive_failures: 0, // Infinite
        }
    }
}

/// Compute the delay before the next retry.
///
/// `consecutive_failures = 0` yields the initial delay, never zero:
/// the first retry is never instantaneous. The cap applies to the
/// exponential term before jitter, so the uncapped tail is flat at
/// `max_delay` modulo the jitter factor.
pub fn compute_backoff_delay<R: Rng + ?Sized>(
    consecutive_failures: u32,
    params: &BackoffParameters,
    rng: &mut R,
) -> Duration {
    // Exponent clamp keeps powi finite for absurd failure counts.
    let exponent = consecutive_failures.min(1024) as i32;
    let base_secs = params.initial_delay.as_secs_f64() * params.multiplier.powi(exponent);
    let capped_secs = base_secs.min(params.max_delay.as_secs_f64());

    let jittered_secs = if params.jitter_ratio > 0.0 {
        let factor = rng.gen_range(1.0 - params.jitter_ratio..=1.0 + params.jitter_ratio);
        capped_secs * factor
    } else {
        capped_secs
    };

    Duration::from_secs_f64(jittered_secs.max(0.0))
}
