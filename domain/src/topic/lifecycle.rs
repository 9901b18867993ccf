//! Topic lifecycle state machine.
//!
//! ```text
//! Preparing ──start──▶ Running ──pause──▶ Paused
//!                         ▲                 │
//!                         └─────resume──────┘
//! ```
//!
//! There is no terminal state: a discussion runs until it is paused.
//! Any other transition fails with
//! [`DomainError::InvalidStateTransition`] and leaves the state unchanged.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicState {
    #[default]
    Preparing,
    Running,
    Paused,
}

/// An externally requested lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Start,
    Pause,
    Resume,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Pause => "pause",
            LifecycleAction::Resume => "resume",
        }
    }
}

impl TopicState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicState::Preparing => "preparing",
            TopicState::Running => "running",
            TopicState::Paused => "paused",
        }
    }

    /// Transition table. Returns the target state, or `None` when the
    /// action is illegal from `self`.
    pub fn target(self, action: LifecycleAction) -> Option<TopicState> {
        match (self, action) {
            (TopicState::Preparing, LifecycleAction::Start) => Some(TopicState::Running),
            (TopicState::Running, LifecycleAction::Pause) => Some(TopicState::Paused),
            (TopicState::Paused, LifecycleAction::Resume) => Some(TopicState::Running),
            _ => None,
        }
    }

    /// Apply `action`, mutating `self` only on success.
    pub fn apply(&mut self, action: LifecycleAction) -> Result<(), DomainError> {
        match self.target(action) {
            Some(next) => {
                *self = next;
                Ok(())
            }
            None => Err(DomainError::InvalidStateTransition {
                from: self.as_str().to_string(),
                action: action.as_str().to_string(),
            }),
        }
    }

    /// The action that brings this state into `Running`, if any.
    pub fn launch_action(self) -> Option<LifecycleAction> {
        match self {
            TopicState::Preparing => Some(LifecycleAction::Start),
            TopicState::Paused => Some(LifecycleAction::Resume),
            TopicState::Running => None,
        }
    }
}

impl std::fmt::Display for TopicState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        let mut state = TopicState::default();
        assert_eq!(state, TopicState::Preparing);

        state.apply(LifecycleAction::Start).unwrap();
        assert_eq!(state, TopicState::Running);

        state.apply(LifecycleAction::Pause).unwrap();
        assert_eq!(state, TopicState::Paused);

        state.apply(LifecycleAction::Resume).unwrap();
        assert_eq!(state, TopicState::Running);
    }

    #[test]
    fn test_illegal_transitions_leave_state_unchanged() {
        let cases = [
            (TopicState::Preparing, LifecycleAction::Pause),
            (TopicState::Preparing, LifecycleAction::Resume),
            (TopicState::Running, LifecycleAction::Start),
            (TopicState::Running, LifecycleAction::Resume),
            (TopicState::Paused, LifecycleAction::Start),
            (TopicState::Paused, LifecycleAction::Pause),
        ];

        for (initial, action) in cases {
            let mut state = initial;
            let err = state.apply(action).unwrap_err();
            assert!(err.is_invalid_transition(), "{:?} / {:?}", initial, action);
            assert_eq!(state, initial);
        }
    }

    #[test]
    fn test_start_again_is_rejected_once_running() {
        let mut state = TopicState::Preparing;
        state.apply(LifecycleAction::Start).unwrap();
        let err = state.apply(LifecycleAction::Start).unwrap_err();
        assert_eq!(err.to_string(), "Cannot start a topic that is running");
    }

    #[test]
    fn test_launch_action() {
        assert_eq!(
            TopicState::Preparing.launch_action(),
            Some(LifecycleAction::Start)
        );
        assert_eq!(
            TopicState::Paused.launch_action(),
            Some(LifecycleAction::Resume)
        );
        assert_eq!(TopicState::Running.launch_action(), None);
    }
}
