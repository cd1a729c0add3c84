//! Redis key schema and hash field names.
//!
//! The layout is an external contract shared with dashboards and
//! downstream consumers; changing any of these strings is a breaking
//! change.

use chrono::NaiveDate;

/// Market hash fields.
pub const FIELD_ALGO: &str = "algo";
pub const FIELD_T_YES_BID: &str = "t_yes_bid";
pub const FIELD_T_YES_ASK: &str = "t_yes_ask";
pub const FIELD_DIRECTION: &str = "direction";
pub const FIELD_YES_BID: &str = "yes_bid";
pub const FIELD_YES_ASK: &str = "yes_ask";
pub const FIELD_EVENT_TICKER: &str = "event_ticker";

/// Market hash key for a Kalshi ticker.
pub fn market_key(ticker: &str) -> String {
    format!("markets:kalshi:{ticker}")
}

/// Display ticker from a namespaced market key (last segment).
pub fn ticker_from_key(market_key: &str) -> &str {
    market_key.rsplit(':').next().unwrap_or(market_key)
}

/// Per-day rejection counter hash.
pub fn rejection_key(day: NaiveDate) -> String {
    format!("algo_rejections:{day}")
}

/// Pub/sub channel for theoretical-price changes on an event.
pub fn event_channel(event_ticker: &str) -> String {
    format!("market_event_updates:{event_ticker}")
}

/// Set of markets a service wants streamed.
pub fn subscriptions_key(service_prefix: &str) -> String {
    format!("{service_prefix}:subscribed_markets")
}

/// Category-scoped subscription set.
pub fn category_subscriptions_key(service_prefix: &str, category: &str) -> String {
    format!("{service_prefix}:subscribed_markets:{category}")
}

/// Hash of ticker -> exchange-assigned subscription ID.
pub fn subscription_ids_key(service_prefix: &str) -> String {
    format!("{service_prefix}:subscription_ids")
}

/// Connection status hash for one service.
pub fn connection_status_key(service: &str) -> String {
    format!("monitoring:connection:{service}")
}
