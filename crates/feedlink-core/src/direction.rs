//! Trade direction derived from theoretical vs quoted prices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Actionable signal for a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
    None,
}

impl Direction {
    /// Wire name as stored in the market hash `direction` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::None => "NONE",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare theoretical prices against the quoted book.
///
/// A buy edge exists when the quoted ask trades below the theoretical ask
/// (undervalued); a zero quoted ask means "no market", never a signal.
/// A sell edge exists when the quoted bid trades above the theoretical bid
/// (overvalued). Both edges true at once is an ambiguous, crossed signal
/// and resolves to `None` rather than guessing a side.
///
/// Total and side-effect free; an absent theoretical price simply disables
/// that side's check.
pub fn compute_direction(
    t_bid: Option<Decimal>,
    t_ask: Option<Decimal>,
    quoted_bid: Decimal,
    quoted_ask: Decimal,
) -> Direction {
    let buy_edge = t_ask.is_some_and(|t| quoted_ask > Decimal::ZERO && quoted_ask < t);
    let sell_edge = t_bid.is_some_and(|t| quoted_bid > Decimal::ZERO && quoted_bid > t);

    match (buy_edge, sell_edge) {
        (true, true) => Direction::None,
        (true, false) => Direction::Buy,
        (false, true) => Direction::Sell,
        (false, false) => Direction::None,
    }
}
