//! The closed set of recognized pricing algorithms.
//!
//! Ownership of a market's theoretical prices is granted per algorithm,
//! so the set is deliberately closed: an unknown name is a caller bug,
//! not a runtime condition to recover from.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A pricing algorithm allowed to claim market ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algo {
    /// Weather-rule based pricing.
    Weather,
    /// Probability-distribution pricing.
    Pdf,
    /// Peak/momentum pricing.
    Peak,
    /// Extreme-event pricing.
    Extreme,
}

impl Algo {
    /// All recognized algorithms.
    pub const ALL: [Algo; 4] = [Algo::Weather, Algo::Pdf, Algo::Peak, Algo::Extreme];

    /// Wire name as stored in the market hash `algo` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Pdf => "pdf",
            Self::Peak => "peak",
            Self::Extreme => "extreme",
        }
    }
}

impl std::fmt::Display for Algo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algo {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(Self::Weather),
            "pdf" => Ok(Self::Pdf),
            "peak" => Ok(Self::Peak),
            "extreme" => Ok(Self::Extreme),
            other => Err(CoreError::UnknownAlgo(other.to_string())),
        }
    }
}
