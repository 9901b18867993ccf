//! In-memory seminar repository.

use async_trait::async_trait;
use seminar_application::ports::repository::{RepositoryError, SeminarRepository};
use seminar_domain::{Role, Speech, Topic, TopicState};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Topics and roles held in process memory, seeded from configuration.
#[derive(Default)]
pub struct InMemorySeminarRepository {
    topics: Mutex<HashMap<String, Topic>>,
    roles: Mutex<HashMap<String, Role>>,
}

impl InMemorySeminarRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_topic(&self, topic: Topic) {
        self.topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(topic.id.clone(), topic);
    }

    pub fn insert_role(&self, role: Role) {
        self.roles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(role.id.clone(), role);
    }

    /// Snapshot of every stored topic, ordered by id
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        topics.sort_by(|a, b| a.id.cmp(&b.id));
        topics
    }

    /// Replace a topic's history. Returns `false` for an unknown topic.
    pub fn restore_history(&self, topic_id: &str, state: TopicState, speeches: Vec<Speech>) -> bool {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        match topics.get_mut(topic_id) {
            Some(topic) => {
                topic.state = state;
                topic.speeches = speeches;
                true
            }
            None => false,
        }
    }

    pub fn topic_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SeminarRepository for InMemorySeminarRepository {
    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, RepositoryError> {
        Ok(self
            .topics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic_id)
            .cloned())
    }

    async fn save_speech(&self, speech: &Speech) -> Result<(), RepositoryError> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let topic = topics
            .get_mut(&speech.topic_id)
            .ok_or_else(|| RepositoryError::NotFound(speech.topic_id.clone()))?;
        topic.append_speech(speech.clone());
        debug!(topic_id = %speech.topic_id, role = %speech.role_name, total = topic.speeches.len(), "speech stored");
        Ok(())
    }

    async fn save_topic_state(
        &self,
        topic_id: &str,
        state: TopicState,
    ) -> Result<(), RepositoryError> {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        let topic = topics
            .get_mut(topic_id)
            .ok_or_else(|| RepositoryError::NotFound(topic_id.to_string()))?;
        topic.state = state;
        Ok(())
    }

    async fn get_roles(&self, role_ids: &[String]) -> Result<Vec<Role>, RepositoryError> {
        let roles = self.roles.lock().unwrap_or_else(|e| e.into_inner());
        role_ids
            .iter()
            .map(|id| {
                roles
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::NotFound(format!("role {}", id)))
            })
            .collect()
    }
}
