//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Cannot {action} a topic that is {from}")]
    InvalidStateTransition { from: String, action: String },

    #[error("Unknown role: '{0}'")]
    UnknownRole(String),

    #[error("A topic needs at least one participant")]
    NoParticipants,

    #[error("Topic subject must not be empty")]
    EmptySubject,

    #[error("No role currently holds the floor")]
    NoCurrentSpeaker,
}

impl DomainError {
    /// Check if this error was caused by an unresolvable speaker designation
    pub fn is_unknown_role(&self) -> bool {
        matches!(self, DomainError::UnknownRole(_))
    }

    /// Check if this error represents an illegal lifecycle transition
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, DomainError::InvalidStateTransition { .. })
    }
}
