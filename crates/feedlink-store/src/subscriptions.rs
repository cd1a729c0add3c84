//! Market subscription registry.
//!
//! Streaming services record which markets they want updates for in a
//! Redis set keyed by a per-service prefix; an optional category scope
//! maintains a parallel set for consumers that only care about one
//! market family. Exchange-assigned subscription IDs live in a sibling
//! hash so a reconnecting service can resubscribe or unsubscribe by ID.

use crate::backend::RedisOps;
use crate::error::{StoreError, StoreResult};
use crate::keys;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Service prefixes with a defined key namespace.
const VALID_PREFIXES: [&str; 2] = ["ws", "rest"];

#[derive(Debug)]
pub struct SubscriptionRegistry<C: RedisOps> {
    redis: C,
    prefix: String,
}

impl<C: RedisOps> SubscriptionRegistry<C> {
    /// Create a registry for a service namespace.
    ///
    /// Only known prefixes are accepted; an unknown prefix would write
    /// into a key namespace nothing reads.
    pub fn new(redis: C, service_prefix: &str) -> StoreResult<Self> {
        if !VALID_PREFIXES.contains(&service_prefix) {
            return Err(StoreError::InvalidServicePrefix(service_prefix.to_string()));
        }
        Ok(Self {
            redis,
            prefix: service_prefix.to_string(),
        })
    }

    /// Register interest in a market. Returns true if it was newly added
    /// to the main set; re-adding is a harmless no-op.
    pub async fn add_market(&self, ticker: &str, category: Option<&str>) -> StoreResult<bool> {
        let added = self
            .redis
            .set_add(&keys::subscriptions_key(&self.prefix), ticker)
            .await?;
        if let Some(category) = category {
            self.redis
                .set_add(
                    &keys::category_subscriptions_key(&self.prefix, category),
                    ticker,
                )
                .await?;
        }
        if added {
            debug!(ticker, prefix = %self.prefix, "Subscribed to market");
        }
        Ok(added)
    }

    /// Drop interest in a market. Returns true if it was present in the
    /// main set.
    pub async fn remove_market(&self, ticker: &str, category: Option<&str>) -> StoreResult<bool> {
        let removed = self
            .redis
            .set_remove(&keys::subscriptions_key(&self.prefix), ticker)
            .await?;
        if let Some(category) = category {
            self.redis
                .set_remove(
                    &keys::category_subscriptions_key(&self.prefix, category),
                    ticker,
                )
                .await?;
        }
        if removed {
            debug!(ticker, prefix = %self.prefix, "Unsubscribed from market");
        }
        Ok(removed)
    }

    /// All markets this service is subscribed to.
    pub async fn subscribed(&self) -> StoreResult<HashSet<String>> {
        self.redis
            .set_members(&keys::subscriptions_key(&self.prefix))
            .await
    }

    /// Markets subscribed under one category.
    pub async fn subscribed_in_category(&self, category: &str) -> StoreResult<HashSet<String>> {
        self.redis
            .set_members(&keys::category_subscriptions_key(&self.prefix, category))
            .await
    }

    /// Record the exchange-assigned ID for an active subscription.
    pub async fn record_subscription_id(&self, ticker: &str, id: &str) -> StoreResult<()> {
        self.redis
            .hash_set(
                &keys::subscription_ids_key(&self.prefix),
                &[(ticker.to_string(), id.to_string())],
            )
            .await
    }

    pub async fn subscription_id(&self, ticker: &str) -> StoreResult<Option<String>> {
        self.redis
            .hash_get(&keys::subscription_ids_key(&self.prefix), ticker)
            .await
    }

    /// Record several ticker/ID pairs in one HSET.
    pub async fn record_subscription_ids(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        self.redis
            .hash_set(&keys::subscription_ids_key(&self.prefix), pairs)
            .await
    }

    /// IDs for the given tickers; tickers with no recorded ID are
    /// absent from the result.
    pub async fn fetch_subscription_ids(
        &self,
        tickers: &[&str],
    ) -> StoreResult<HashMap<String, String>> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }
        let values = self
            .redis
            .hash_get_many(&keys::subscription_ids_key(&self.prefix), tickers)
            .await?;
        Ok(tickers
            .iter()
            .zip(values)
            .filter_map(|(ticker, id)| id.map(|id| (ticker.to_string(), id)))
            .collect())
    }

    pub async fn subscription_ids(&self) -> StoreResult<HashMap<String, String>> {
        self.redis
            .hash_get_all(&keys::subscription_ids_key(&self.prefix))
            .await
    }

    /// Forget several subscription IDs in one HDEL; returns how many
    /// were present.
    pub async fn clear_subscription_ids(&self, tickers: &[&str]) -> StoreResult<u64> {
        if tickers.is_empty() {
            return Ok(0);
        }
        self.redis
            .hash_delete(&keys::subscription_ids_key(&self.prefix), tickers)
            .await
    }

    /// Forget a subscription ID after an unsubscribe or reconnect.
    pub async fn clear_subscription_id(&self, ticker: &str) -> StoreResult<bool> {
        let removed = self
            .redis
            .hash_delete(&keys::subscription_ids_key(&self.prefix), &[ticker])
            .await?;
        Ok(removed > 0)
    }
}
