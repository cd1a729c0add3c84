//! Single-writer arbitration over per-market theoretical prices.
//!
//! Several independent algorithms compute a theoretical fair price for
//! the same market; only one may own the market's `t_yes_bid`/`t_yes_ask`
//! fields at a time. The first algorithm to touch an unclaimed market
//! claims it (HSETNX, atomic with respect to concurrent claimants);
//! subsequent writes from the owner succeed, writes from anyone else are
//! rejected and counted. Losing arbitration is a frequent, expected
//! outcome, so it is a result value, never an error.

use crate::backend::{HashWrite, RedisOps};
use crate::error::StoreResult;
use crate::keys::{
    self, FIELD_ALGO, FIELD_DIRECTION, FIELD_EVENT_TICKER, FIELD_T_YES_ASK, FIELD_T_YES_BID,
    FIELD_YES_ASK, FIELD_YES_BID,
};
use chrono::Utc;
use feedlink_core::{compute_direction, Algo, Direction};
use feedlink_telemetry::metrics::OWNERSHIP_REJECTIONS_TOTAL;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::{debug, warn};

/// Outcome of one update request; ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketUpdateResult {
    pub success: bool,
    pub rejected: bool,
    pub reason: Option<String>,
    pub owning_algo: Option<String>,
}

impl MarketUpdateResult {
    fn accepted(algo: Algo) -> Self {
        Self {
            success: true,
            rejected: false,
            reason: None,
            owning_algo: Some(algo.as_str().to_string()),
        }
    }

    fn rejected_by(owner: &str) -> Self {
        Self {
            success: false,
            rejected: true,
            reason: Some(format!("owned_by_{owner}")),
            owning_algo: Some(owner.to_string()),
        }
    }

    fn noop(reason: &str) -> Self {
        Self {
            success: false,
            rejected: false,
            reason: Some(reason.to_string()),
            owning_algo: None,
        }
    }
}

/// One market's theoretical prices inside a batch update.
#[derive(Debug, Clone)]
pub struct SignalUpdate {
    pub market_key: String,
    pub t_yes_bid: Option<Decimal>,
    pub t_yes_ask: Option<Decimal>,
}

/// Per-bucket outcome of a batch update, keyed by market key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchUpdateOutcome {
    pub succeeded: Vec<String>,
    /// (market key, owning algo) for each update that lost arbitration.
    pub rejected: Vec<(String, String)>,
    pub failed: Vec<String>,
}

/// Arbiter over one shared Redis instance.
///
/// Safe to call concurrently from any number of processes; correctness
/// relies entirely on each backend call being a single atomic Redis
/// command.
#[derive(Clone)]
pub struct OwnershipArbiter<C: RedisOps> {
    redis: C,
}

impl<C: RedisOps> OwnershipArbiter<C> {
    pub fn new(redis: C) -> Self {
        Self { redis }
    }

    /// Request to publish theoretical prices for a market.
    ///
    /// Supplying only one side deletes the stale opposite theoretical
    /// field (a flipped signal must not leave the old side lingering);
    /// supplying both leaves both. Supplying neither is a no-op, not a
    /// failure.
    pub async fn request_update(
        &self,
        market_key: &str,
        algo: Algo,
        t_yes_bid: Option<Decimal>,
        t_yes_ask: Option<Decimal>,
        ticker: Option<&str>,
    ) -> StoreResult<MarketUpdateResult> {
        if t_yes_bid.is_none() && t_yes_ask.is_none() {
            return Ok(MarketUpdateResult::noop("no_prices_provided"));
        }

        let display_ticker = ticker.unwrap_or_else(|| keys::ticker_from_key(market_key));

        // Atomic first-claim: either we set the owner field here, or it
        // already existed and we check who holds it.
        let claimed = self
            .redis
            .hash_set_if_absent(market_key, FIELD_ALGO, algo.as_str())
            .await?;

        if !claimed {
            match self.redis.hash_get(market_key, FIELD_ALGO).await? {
                Some(owner) if owner != algo.as_str() => {
                    debug!(
                        ticker = display_ticker,
                        owner = %owner,
                        requesting = %algo,
                        "Market owned by another algo, rejecting update"
                    );
                    self.record_rejection(algo, &owner).await;
                    return Ok(MarketUpdateResult::rejected_by(&owner));
                }
                // Owner is us, or the field vanished between the two
                // commands (manual reset); either way we may write.
                _ => {}
            }
        }

        self.write_theoretical_prices(market_key, algo, t_yes_bid, t_yes_ask, display_ticker)
            .await?;

        Ok(MarketUpdateResult::accepted(algo))
    }

    /// Publish theoretical prices for several markets in one atomic write.
    ///
    /// Ownership is checked per market exactly as in
    /// [`OwnershipArbiter::request_update`]; every allowed signal then
    /// lands in a single MULTI/EXEC batch, SELL-side (bid) writes
    /// before BUY-side (ask) writes so a flipped market is cleared
    /// before its new side is set. A rejection or a no-price signal
    /// never aborts the rest of the batch.
    pub async fn batch_update(
        &self,
        algo: Algo,
        signals: &[SignalUpdate],
    ) -> StoreResult<BatchUpdateOutcome> {
        let mut outcome = BatchUpdateOutcome::default();
        let mut bid_writes = Vec::new();
        let mut ask_writes = Vec::new();
        let mut accepted = Vec::new();

        for signal in signals {
            if signal.t_yes_bid.is_none() && signal.t_yes_ask.is_none() {
                outcome.failed.push(signal.market_key.clone());
                continue;
            }

            let claimed = self
                .redis
                .hash_set_if_absent(&signal.market_key, FIELD_ALGO, algo.as_str())
                .await?;
            if !claimed {
                if let Some(owner) = self.redis.hash_get(&signal.market_key, FIELD_ALGO).await? {
                    if owner != algo.as_str() {
                        self.record_rejection(algo, &owner).await;
                        outcome.rejected.push((signal.market_key.clone(), owner));
                        continue;
                    }
                }
            }

            let direction = self
                .direction_for(&signal.market_key, signal.t_yes_bid, signal.t_yes_ask)
                .await?;
            let meta = vec![
                (FIELD_ALGO.to_string(), algo.as_str().to_string()),
                (FIELD_DIRECTION.to_string(), direction.as_str().to_string()),
            ];

            if let Some(bid) = signal.t_yes_bid {
                let mut entries = meta.clone();
                entries.push((FIELD_T_YES_BID.to_string(), bid.to_string()));
                bid_writes.push(HashWrite::Set {
                    key: signal.market_key.clone(),
                    entries,
                });
                if signal.t_yes_ask.is_none() {
                    bid_writes.push(HashWrite::Delete {
                        key: signal.market_key.clone(),
                        fields: vec![FIELD_T_YES_ASK.to_string()],
                    });
                }
            }
            if let Some(ask) = signal.t_yes_ask {
                let mut entries = if signal.t_yes_bid.is_none() {
                    meta.clone()
                } else {
                    Vec::new()
                };
                entries.push((FIELD_T_YES_ASK.to_string(), ask.to_string()));
                if signal.t_yes_bid.is_none() {
                    ask_writes.push(HashWrite::Delete {
                        key: signal.market_key.clone(),
                        fields: vec![FIELD_T_YES_BID.to_string()],
                    });
                }
                ask_writes.push(HashWrite::Set {
                    key: signal.market_key.clone(),
                    entries,
                });
            }

            accepted.push(signal.market_key.clone());
        }

        if accepted.is_empty() {
            return Ok(outcome);
        }

        bid_writes.extend(ask_writes);
        if let Err(e) = self.redis.run_atomic(&bid_writes).await {
            warn!(markets = accepted.len(), error = %e, "Batch signal write failed");
            outcome.failed.extend(accepted);
            return Ok(outcome);
        }

        for market_key in &accepted {
            let ticker = keys::ticker_from_key(market_key);
            if let Err(e) = self.publish_market_event(market_key, ticker).await {
                warn!(ticker, error = %e, "Failed to publish market event update");
            }
        }
        debug!(
            algo = %algo,
            succeeded = accepted.len(),
            rejected = outcome.rejected.len(),
            failed = outcome.failed.len(),
            "Batch signal update applied"
        );
        outcome.succeeded = accepted;

        Ok(outcome)
    }

    /// Derived direction for one market, from its quoted book.
    async fn direction_for(
        &self,
        market_key: &str,
        t_yes_bid: Option<Decimal>,
        t_yes_ask: Option<Decimal>,
    ) -> StoreResult<Direction> {
        let quoted = self
            .redis
            .hash_get_many(market_key, &[FIELD_YES_BID, FIELD_YES_ASK])
            .await?;
        let quoted_bid = parse_price(quoted.first());
        let quoted_ask = parse_price(quoted.get(1));
        Ok(compute_direction(t_yes_bid, t_yes_ask, quoted_bid, quoted_ask))
    }

    async fn write_theoretical_prices(
        &self,
        market_key: &str,
        algo: Algo,
        t_yes_bid: Option<Decimal>,
        t_yes_ask: Option<Decimal>,
        ticker: &str,
    ) -> StoreResult<()> {
        let direction = self.direction_for(market_key, t_yes_bid, t_yes_ask).await?;

        let mut entries = vec![
            (FIELD_ALGO.to_string(), algo.as_str().to_string()),
            (FIELD_DIRECTION.to_string(), direction.as_str().to_string()),
        ];
        if let Some(bid) = t_yes_bid {
            entries.push((FIELD_T_YES_BID.to_string(), bid.to_string()));
        }
        if let Some(ask) = t_yes_ask {
            entries.push((FIELD_T_YES_ASK.to_string(), ask.to_string()));
        }
        self.redis.hash_set(market_key, &entries).await?;

        // One-sided write: the opposite theoretical price is stale now.
        match (t_yes_bid, t_yes_ask) {
            (Some(_), None) => {
                self.redis.hash_delete(market_key, &[FIELD_T_YES_ASK]).await?;
            }
            (None, Some(_)) => {
                self.redis.hash_delete(market_key, &[FIELD_T_YES_BID]).await?;
            }
            _ => {}
        }

        debug!(
            ticker,
            algo = %algo,
            t_yes_bid = ?t_yes_bid,
            t_yes_ask = ?t_yes_ask,
            direction = %direction,
            "Updated market theoretical prices"
        );

        if let Err(e) = self.publish_market_event(market_key, ticker).await {
            // Notification is best-effort; losing it must not break the
            // trading path.
            warn!(ticker, error = %e, "Failed to publish market event update");
        }

        Ok(())
    }

    async fn publish_market_event(&self, market_key: &str, ticker: &str) -> StoreResult<()> {
        let event_ticker = self
            .redis
            .hash_get(market_key, FIELD_EVENT_TICKER)
            .await?
            .filter(|t| !t.is_empty());

        let Some(event_ticker) = event_ticker else {
            debug!(ticker, "No event_ticker, skipping publish");
            return Ok(());
        };

        let channel = keys::event_channel(&event_ticker);
        let payload = serde_json::json!({
            "market_ticker": ticker,
            "timestamp": Utc::now().to_rfc3339(),
        })
        .to_string();
        self.redis.publish(&channel, &payload).await?;
        debug!(ticker, channel = %channel, "Published market event update");
        Ok(())
    }

    async fn record_rejection(&self, requesting: Algo, owning: &str) {
        OWNERSHIP_REJECTIONS_TOTAL
            .with_label_values(&[requesting.as_str(), owning])
            .inc();

        let key = keys::rejection_key(Utc::now().date_naive());
        let field = format!("{requesting}:{owning}");
        if let Err(e) = self.redis.hash_increment(&key, &field, 1).await {
            // Losing a counter must not break the caller's path.
            warn!(field = %field, error = %e, "Failed to record rejection stat");
        }
    }

    /// Current owner of a market, if any.
    pub async fn owner(&self, market_key: &str) -> StoreResult<Option<String>> {
        self.redis.hash_get(market_key, FIELD_ALGO).await
    }

    /// Stored derived direction for a market, if any.
    pub async fn market_direction(&self, market_key: &str) -> StoreResult<Option<String>> {
        self.redis.hash_get(market_key, FIELD_DIRECTION).await
    }

    /// Unconditionally remove the owner field (manual recovery).
    ///
    /// Returns true if the field existed.
    pub async fn clear_ownership(&self, market_key: &str) -> StoreResult<bool> {
        let removed = self.redis.hash_delete(market_key, &[FIELD_ALGO]).await?;
        Ok(removed > 0)
    }

    /// Rejection counters for the last `days` UTC days (1 = today only).
    ///
    /// Maps date -> `"{requesting}:{owning}"` -> count. Days with no
    /// rejections are omitted.
    pub async fn rejection_stats(
        &self,
        days: u32,
    ) -> StoreResult<BTreeMap<chrono::NaiveDate, HashMap<String, u64>>> {
        let today = Utc::now().date_naive();
        let mut stats = BTreeMap::new();

        for i in 0..days {
            let day = today - chrono::Duration::days(i64::from(i));
            let data = self.redis.hash_get_all(&keys::rejection_key(day)).await?;
            if data.is_empty() {
                continue;
            }

            let day_stats: HashMap<String, u64> = data
                .into_iter()
                .map(|(field, count)| {
                    let parsed = count.parse().unwrap_or_else(|_| {
                        warn!(field = %field, value = %count, "Unparseable rejection count");
                        0
                    });
                    (field, parsed)
                })
                .collect();
            stats.insert(day, day_stats);
        }

        Ok(stats)
    }
}

fn parse_price(value: Option<&Option<String>>) -> Decimal {
    value
        .and_then(|v| v.as_deref())
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use rust_decimal_macros::dec;

    fn arbiter() -> (OwnershipArbiter<MemoryBackend>, MemoryBackend) {
        let backend = MemoryBackend::new();
        (OwnershipArbiter::new(backend.clone()), backend)
    }

    const MARKET: &str = "markets:kalshi:KXHIGH-KDCA-202501";

    #[tokio::test]
    async fn test_no_prices_is_noop_not_failure() {
        let (arbiter, backend) = arbiter();

        let result = arbiter
            .request_update(MARKET, Algo::Weather, None, None, None)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(!result.rejected);
        assert_eq!(result.reason.as_deref(), Some("no_prices_provided"));
        assert_eq!(backend.hash_field(MARKET, FIELD_ALGO), None, "no claim");
    }

    #[tokio::test]
    async fn test_first_writer_claims_unowned_market() {
        let (arbiter, backend) = arbiter();

        let result = arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), Some(dec!(60)), None)
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.rejected);
        assert_eq!(result.owning_algo.as_deref(), Some("weather"));
        assert_eq!(
            backend.hash_field(MARKET, FIELD_ALGO).as_deref(),
            Some("weather")
        );
        assert_eq!(
            backend.hash_field(MARKET, FIELD_T_YES_BID).as_deref(),
            Some("40")
        );
        assert_eq!(
            backend.hash_field(MARKET, FIELD_T_YES_ASK).as_deref(),
            Some("60")
        );
    }

    #[tokio::test]
    async fn test_conflicting_writer_is_rejected_and_counted() {
        let (arbiter, backend) = arbiter();

        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), None, None)
            .await
            .unwrap();

        let result = arbiter
            .request_update(MARKET, Algo::Pdf, Some(dec!(45)), None, None)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.rejected);
        assert_eq!(result.reason.as_deref(), Some("owned_by_weather"));
        assert_eq!(result.owning_algo.as_deref(), Some("weather"));

        // Owner's price untouched.
        assert_eq!(
            backend.hash_field(MARKET, FIELD_T_YES_BID).as_deref(),
            Some("40")
        );

        // Rejection counted under "{requesting}:{owning}" for today.
        let stats = arbiter.rejection_stats(1).await.unwrap();
        let today = Utc::now().date_naive();
        assert_eq!(stats[&today]["pdf:weather"], 1);
    }

    #[tokio::test]
    async fn test_same_owner_updates_are_idempotent() {
        let (arbiter, _backend) = arbiter();

        for _ in 0..3 {
            let result = arbiter
                .request_update(MARKET, Algo::Peak, None, Some(dec!(70)), None)
                .await
                .unwrap();
            assert!(result.success);
        }

        // Repeated owner writes never count as rejections.
        let stats = arbiter.rejection_stats(1).await.unwrap();
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn test_one_sided_write_deletes_stale_opposite() {
        let (arbiter, backend) = arbiter();

        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), Some(dec!(60)), None)
            .await
            .unwrap();

        // Bid-only write clears the stale ask.
        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(42)), None, None)
            .await
            .unwrap();
        assert_eq!(
            backend.hash_field(MARKET, FIELD_T_YES_BID).as_deref(),
            Some("42")
        );
        assert_eq!(backend.hash_field(MARKET, FIELD_T_YES_ASK), None);

        // Ask-only write clears the stale bid.
        arbiter
            .request_update(MARKET, Algo::Weather, None, Some(dec!(65)), None)
            .await
            .unwrap();
        assert_eq!(backend.hash_field(MARKET, FIELD_T_YES_BID), None);
        assert_eq!(
            backend.hash_field(MARKET, FIELD_T_YES_ASK).as_deref(),
            Some("65")
        );
    }

    #[tokio::test]
    async fn test_both_sides_supplied_deletes_neither() {
        let (arbiter, backend) = arbiter();

        arbiter
            .request_update(MARKET, Algo::Pdf, Some(dec!(40)), Some(dec!(60)), None)
            .await
            .unwrap();

        assert!(backend.hash_field(MARKET, FIELD_T_YES_BID).is_some());
        assert!(backend.hash_field(MARKET, FIELD_T_YES_ASK).is_some());
    }

    #[tokio::test]
    async fn test_direction_written_from_quoted_book() {
        let (arbiter, backend) = arbiter();
        backend.seed_hash_field(MARKET, FIELD_YES_BID, "1");
        backend.seed_hash_field(MARKET, FIELD_YES_ASK, "11");

        // Quoted ask 11 below theoretical ask 92: BUY.
        arbiter
            .request_update(MARKET, Algo::Extreme, None, Some(dec!(92)), None)
            .await
            .unwrap();
        assert_eq!(
            backend.hash_field(MARKET, FIELD_DIRECTION).as_deref(),
            Some("BUY")
        );
        assert_eq!(
            arbiter.market_direction(MARKET).await.unwrap().as_deref(),
            Some("BUY")
        );
    }

    #[tokio::test]
    async fn test_event_publish_only_with_event_ticker() {
        let (arbiter, backend) = arbiter();

        // No event_ticker: no publish.
        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), None, None)
            .await
            .unwrap();
        assert!(backend.published().is_empty());

        backend.seed_hash_field(MARKET, FIELD_EVENT_TICKER, "KXHIGH-KDCA");
        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(41)), None, Some("KXHIGH-KDCA-202501"))
            .await
            .unwrap();

        let published = backend.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "market_event_updates:KXHIGH-KDCA");
        let payload: serde_json::Value = serde_json::from_str(&published[0].1).unwrap();
        assert_eq!(payload["market_ticker"], "KXHIGH-KDCA-202501");
        assert!(payload["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_clear_ownership_allows_new_claimant() {
        let (arbiter, _backend) = arbiter();

        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), None, None)
            .await
            .unwrap();
        assert_eq!(
            arbiter.owner(MARKET).await.unwrap().as_deref(),
            Some("weather")
        );

        assert!(arbiter.clear_ownership(MARKET).await.unwrap());
        assert_eq!(arbiter.owner(MARKET).await.unwrap(), None);
        // Clearing an already-unclaimed market reports false.
        assert!(!arbiter.clear_ownership(MARKET).await.unwrap());

        let result = arbiter
            .request_update(MARKET, Algo::Pdf, None, Some(dec!(55)), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(arbiter.owner(MARKET).await.unwrap().as_deref(), Some("pdf"));
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_exactly_one_winner() {
        let backend = MemoryBackend::new();

        let mut handles = Vec::new();
        for algo in Algo::ALL {
            let arbiter = OwnershipArbiter::new(backend.clone());
            handles.push(tokio::spawn(async move {
                arbiter
                    .request_update(MARKET, algo, Some(dec!(50)), None, None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        let mut rejections = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            if result.success {
                winners += 1;
            } else {
                assert!(result.rejected);
                rejections += 1;
            }
        }

        assert_eq!(winners, 1, "exactly one claimant wins");
        assert_eq!(rejections, Algo::ALL.len() - 1);

        // The winner recorded in the hash matches every rejection reason.
        let owner = backend.hash_field(MARKET, FIELD_ALGO).unwrap();
        assert!(Algo::from_str(&owner).is_ok());
    }

    #[tokio::test]
    async fn test_batch_update_buckets_outcomes() {
        let (arbiter, backend) = arbiter();
        backend.seed_hash_field("markets:kalshi:OWNED", FIELD_ALGO, "weather");

        let outcome = arbiter
            .batch_update(
                Algo::Pdf,
                &[
                    SignalUpdate {
                        market_key: "markets:kalshi:A".to_string(),
                        t_yes_bid: Some(dec!(40)),
                        t_yes_ask: Some(dec!(60)),
                    },
                    SignalUpdate {
                        market_key: "markets:kalshi:OWNED".to_string(),
                        t_yes_bid: Some(dec!(45)),
                        t_yes_ask: None,
                    },
                    SignalUpdate {
                        market_key: "markets:kalshi:EMPTY".to_string(),
                        t_yes_bid: None,
                        t_yes_ask: None,
                    },
                ],
            )
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, vec!["markets:kalshi:A"]);
        assert_eq!(
            outcome.rejected,
            vec![("markets:kalshi:OWNED".to_string(), "weather".to_string())]
        );
        assert_eq!(outcome.failed, vec!["markets:kalshi:EMPTY"]);

        assert_eq!(
            backend.hash_field("markets:kalshi:A", FIELD_ALGO).as_deref(),
            Some("pdf")
        );
        assert_eq!(
            backend
                .hash_field("markets:kalshi:A", FIELD_T_YES_BID)
                .as_deref(),
            Some("40")
        );
        // The owned market kept its owner's state untouched.
        assert_eq!(
            backend
                .hash_field("markets:kalshi:OWNED", FIELD_ALGO)
                .as_deref(),
            Some("weather")
        );
        assert_eq!(backend.hash_field("markets:kalshi:OWNED", FIELD_T_YES_BID), None);

        let stats = arbiter.rejection_stats(1).await.unwrap();
        let today = Utc::now().date_naive();
        assert_eq!(stats[&today]["pdf:weather"], 1);
    }

    #[tokio::test]
    async fn test_batch_update_orders_bid_writes_before_ask_writes() {
        let (arbiter, backend) = arbiter();

        arbiter
            .batch_update(
                Algo::Weather,
                &[
                    SignalUpdate {
                        market_key: "markets:kalshi:ASKONLY".to_string(),
                        t_yes_bid: None,
                        t_yes_ask: Some(dec!(70)),
                    },
                    SignalUpdate {
                        market_key: "markets:kalshi:BIDONLY".to_string(),
                        t_yes_bid: Some(dec!(30)),
                        t_yes_ask: None,
                    },
                ],
            )
            .await
            .unwrap();

        // Every write for the bid-side (SELL) signal precedes every
        // write for the ask-side (BUY) signal, regardless of input
        // order.
        let writes = backend.batched_writes();
        let write_key = |write: &HashWrite| match write {
            HashWrite::Set { key, .. } | HashWrite::Delete { key, .. } => key.clone(),
        };
        let last_bid_signal = writes
            .iter()
            .rposition(|w| write_key(w) == "markets:kalshi:BIDONLY")
            .unwrap();
        let first_ask_signal = writes
            .iter()
            .position(|w| write_key(w) == "markets:kalshi:ASKONLY")
            .unwrap();
        assert!(last_bid_signal < first_ask_signal);

        // Both one-sided writes cleared their stale opposite field.
        assert_eq!(backend.hash_field("markets:kalshi:ASKONLY", FIELD_T_YES_BID), None);
        assert_eq!(backend.hash_field("markets:kalshi:BIDONLY", FIELD_T_YES_ASK), None);
        assert_eq!(
            backend
                .hash_field("markets:kalshi:ASKONLY", FIELD_T_YES_ASK)
                .as_deref(),
            Some("70")
        );
    }

    #[tokio::test]
    async fn test_batch_update_publishes_for_each_succeeded_market() {
        let (arbiter, backend) = arbiter();
        backend.seed_hash_field("markets:kalshi:A", FIELD_EVENT_TICKER, "KXHIGH-KDCA");
        backend.seed_hash_field("markets:kalshi:B", FIELD_EVENT_TICKER, "KXHIGH-KNYC");

        arbiter
            .batch_update(
                Algo::Peak,
                &[
                    SignalUpdate {
                        market_key: "markets:kalshi:A".to_string(),
                        t_yes_bid: Some(dec!(40)),
                        t_yes_ask: None,
                    },
                    SignalUpdate {
                        market_key: "markets:kalshi:B".to_string(),
                        t_yes_bid: None,
                        t_yes_ask: Some(dec!(55)),
                    },
                ],
            )
            .await
            .unwrap();

        let channels: Vec<String> = backend.published().into_iter().map(|(c, _)| c).collect();
        assert_eq!(
            channels,
            vec![
                "market_event_updates:KXHIGH-KDCA",
                "market_event_updates:KXHIGH-KNYC"
            ]
        );
    }

    #[tokio::test]
    async fn test_rejection_stats_multi_day_scan() {
        let (arbiter, backend) = arbiter();
        let today = Utc::now().date_naive();
        let yesterday = today - chrono::Duration::days(1);

        backend.seed_hash_field(&keys::rejection_key(yesterday), "pdf:weather", "3");
        arbiter
            .request_update(MARKET, Algo::Weather, Some(dec!(40)), None, None)
            .await
            .unwrap();
        arbiter
            .request_update(MARKET, Algo::Extreme, Some(dec!(41)), None, None)
            .await
            .unwrap();

        let stats = arbiter.rejection_stats(2).await.unwrap();
        assert_eq!(stats[&yesterday]["pdf:weather"], 3);
        assert_eq!(stats[&today]["extreme:weather"], 1);

        // A one-day scan excludes yesterday.
        let stats = arbiter.rejection_stats(1).await.unwrap();
        assert!(!stats.contains_key(&yesterday));
    }
}
