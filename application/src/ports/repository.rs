//! Persistence port
//!
//! Topics, their speeches and the roles they reference.

use async_trait::async_trait;
use seminar_domain::{Role, Speech, Topic, TopicState};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[async_trait]
pub trait SeminarRepository: Send + Sync {
    /// Load a topic with its full speech history
    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, RepositoryError>;

    /// Append one completed speech
    async fn save_speech(&self, speech: &Speech) -> Result<(), RepositoryError>;

    /// Record a lifecycle state change
    async fn save_topic_state(&self, topic_id: &str, state: TopicState)
    -> Result<(), RepositoryError>;

    /// Load roles by id, in the order requested.
    ///
    /// Fails with `NotFound` if any id is unknown.
    async fn get_roles(&self, role_ids: &[String]) -> Result<Vec<Role>, RepositoryError>;
}
