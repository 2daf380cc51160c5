use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::service::RelayClient;

/// Reply for any state other than `up` or `down`.
pub const INVALID_STATE: &str = "Invalid state.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorState {
    Up,
    Down,
}

impl FromStr for MirrorState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(MirrorState::Up),
            "down" => Ok(MirrorState::Down),
            _ => Err(()),
        }
    }
}

/// Device commands that move the flip mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCommands {
    #[serde(default = "default_up")]
    pub up: String,
    #[serde(default = "default_down")]
    pub down: String,
}

fn default_up() -> String {
    "UP".to_string()
}

fn default_down() -> String {
    "DOWN".to_string()
}

impl Default for MirrorCommands {
    fn default() -> Self {
        Self {
            up: default_up(),
            down: default_down(),
        }
    }
}

impl MirrorCommands {
    pub fn for_state(&self, state: MirrorState) -> &str {
        match state {
            MirrorState::Up => &self.up,
            MirrorState::Down => &self.down,
        }
    }
}

impl RelayClient {
    /// Move the flip mirror. Unknown states are answered locally without touching the network.
    pub async fn flip(&self, state: &str) -> String {
        let Ok(state) = state.parse::<MirrorState>() else {
            log::debug!("Rejected flip mirror state {:?}", state);
            return INVALID_STATE.to_string();
        };
        let cmd = self.mirror_commands().for_state(state).to_string();
        self.command(&cmd).await
    }
}
