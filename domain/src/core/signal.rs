//! State signals exchanged between a topic's run loop and the outside world.

use serde::{Deserialize, Serialize};

/// Signal carried on the cross-process pause channel, also used as the
/// outcome tag of a single role turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateSignal {
    Pause,
    Resume,
    Normal,
    Error,
}

impl StateSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateSignal::Pause => "pause",
            StateSignal::Resume => "resume",
            StateSignal::Normal => "normal",
            StateSignal::Error => "error",
        }
    }
}

impl std::fmt::Display for StateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
