//! Topic domain entities

use super::lifecycle::{LifecycleAction, TopicState};
use crate::core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed turn (Entity, append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speech {
    pub topic_id: String,
    pub role_id: String,
    pub role_name: String,
    pub content: String,
    pub time: DateTime<Utc>,
}

impl Speech {
    pub fn new(
        topic_id: impl Into<String>,
        role_id: impl Into<String>,
        role_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            topic_id: topic_id.into(),
            role_id: role_id.into(),
            role_name: role_name.into(),
            content: content.into(),
            time: Utc::now(),
        }
    }
}

/// A moderated discussion session (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: String,
    /// Free-text subject of the discussion
    pub subject: String,
    /// Account that owns the topic and its roles
    pub owner: String,
    pub moderator: String,
    /// Participant role ids, in configured order
    pub participants: Vec<String>,
    /// Reference documents consulted for supporting material
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub speeches: Vec<Speech>,
    #[serde(default)]
    pub state: TopicState,
}

impl Topic {
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        moderator: impl Into<String>,
        participants: Vec<String>,
    ) -> Result<Self, DomainError> {
        let subject = subject.into();
        if subject.trim().is_empty() {
            return Err(DomainError::EmptySubject);
        }
        if participants.is_empty() {
            return Err(DomainError::NoParticipants);
        }
        Ok(Self {
            id: id.into(),
            subject,
            owner: String::new(),
            moderator: moderator.into(),
            participants,
            documents: Vec::new(),
            speeches: Vec::new(),
            state: TopicState::Preparing,
        })
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_documents(mut self, documents: Vec<String>) -> Self {
        self.documents = documents;
        self
    }

    pub fn start(&mut self) -> Result<(), DomainError> {
        self.state.apply(LifecycleAction::Start)
    }

    pub fn pause(&mut self) -> Result<(), DomainError> {
        self.state.apply(LifecycleAction::Pause)
    }

    pub fn resume(&mut self) -> Result<(), DomainError> {
        self.state.apply(LifecycleAction::Resume)
    }

    /// Bring the topic into `Running` from whichever state allows it.
    pub fn launch(&mut self) -> Result<(), DomainError> {
        match self.state.launch_action() {
            Some(action) => self.state.apply(action),
            // Running -> start is the illegal transition callers hit here
            None => self.start(),
        }
    }

    pub fn last_speech(&self) -> Option<&Speech> {
        self.speeches.last()
    }

    pub fn append_speech(&mut self, speech: Speech) {
        self.speeches.push(speech);
    }
}
