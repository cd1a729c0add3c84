//! Connection state machine vocabulary.

use serde::{Deserialize, Serialize};

/// State of one logical upstream connection.
///
/// Health probes only run while the connection is operational
/// (`Ready` or `Degraded`). `Degraded` is re-entrant: a passing probe
/// returns the connection to `Ready`, repeated failing probes drop it
/// to `Disconnected` and force a reconnect. `Failed` is terminal and
/// only reached when the retry ceiling is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticated,
    Ready,
    Degraded,
    ShuttingDown,
    Failed,
}

impl ConnectionState {
    /// Wire name as stored in the status hash.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Authenticated => "authenticated",
            Self::Ready => "ready",
            Self::Degraded => "degraded",
            Self::ShuttingDown => "shutting_down",
            Self::Failed => "failed",
        }
    }

    /// States in which health probes run.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Ready | Self::Degraded)
    }

    /// Terminal failure state; no further automatic retries.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::str::FromStr for ConnectionState {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "authenticated" => Ok(Self::Authenticated),
            "ready" => Ok(Self::Ready),
            "degraded" => Ok(Self::Degraded),
            "shutting_down" => Ok(Self::ShuttingDown),
            "failed" => Ok(Self::Failed),
            other => Err(crate::CoreError::InvalidConfig(format!(
                "unknown connection state: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
