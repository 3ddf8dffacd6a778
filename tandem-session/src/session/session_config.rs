use serde::Deserialize;
use std::time::Duration;
use tandem_core::RoomId;

pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "chat";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub room: RoomId,
    pub data_channel_label: String,
    pub timing: SessionTiming,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            room: RoomId::from("tandem"),
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
            timing: SessionTiming::default(),
        }
    }
}

impl SessionConfig {
    pub fn for_room(room: impl Into<RoomId>) -> Self {
        Self {
            room: room.into(),
            ..Self::default()
        }
    }
}

/// Session timers, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionTiming {
    pub announce_initial_delay_ms: u64,
    pub announce_period_ms: u64,
    pub negotiation_timeout_ms: u64,
    pub failure_restart_delay_ms: u64,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            announce_initial_delay_ms: 500,
            announce_period_ms: 2_000,
            negotiation_timeout_ms: 10_000,
            failure_restart_delay_ms: 2_000,
        }
    }
}

impl SessionTiming {
    pub fn announce_initial_delay(&self) -> Duration {
        Duration::from_millis(self.announce_initial_delay_ms)
    }

    pub fn announce_period(&self) -> Duration {
        Duration::from_millis(self.announce_period_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn failure_restart_delay(&self) -> Duration {
        Duration::from_millis(self.failure_restart_delay_ms)
    }
}
