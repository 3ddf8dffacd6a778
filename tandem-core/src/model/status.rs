use serde::{Deserialize, Serialize};
use std::fmt;

/// User-facing connection status.
///
/// Informational only: nothing in the session reads it back to decide a
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionStatus {
    Initializing,
    WaitingForPeer,
    Negotiating,
    Connected,
    Reconnecting,
    Disconnected,
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::WaitingForPeer => "waiting for peer",
            Self::Negotiating => "negotiating",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
