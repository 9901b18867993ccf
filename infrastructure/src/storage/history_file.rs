//! Seminar history persisted to a JSON file.
//!
//! Roles and topic definitions always come from configuration. Only what a
//! run produces is stored: each topic's lifecycle state and its speeches.
//! Every change rewrites the whole file through a temporary sibling and a
//! rename, so a crash leaves either the old or the new snapshot.

use super::memory_repository::InMemorySeminarRepository;
use async_trait::async_trait;
use seminar_application::ports::repository::{RepositoryError, SeminarRepository};
use seminar_domain::{Role, Speech, Topic, TopicState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    topics: BTreeMap<String, TopicHistory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TopicHistory {
    state: TopicState,
    speeches: Vec<Speech>,
}

impl From<&Topic> for TopicHistory {
    fn from(topic: &Topic) -> Self {
        Self {
            state: topic.state,
            speeches: topic.speeches.clone(),
        }
    }
}

pub struct JsonHistoryRepository {
    inner: InMemorySeminarRepository,
    path: PathBuf,
    /// Histories of topics no longer configured; written back untouched
    retained: BTreeMap<String, TopicHistory>,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonHistoryRepository {
    /// Wrap a seeded repository, restoring whatever history `path` holds.
    ///
    /// A missing file means no history yet; an unreadable one is an error.
    pub async fn open(
        inner: InMemorySeminarRepository,
        path: impl Into<PathBuf>,
    ) -> Result<Self, RepositoryError> {
        let path = path.into();
        let history = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<HistoryFile>(&text).map_err(|e| {
                RepositoryError::Storage(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryFile::default(),
            Err(e) => {
                return Err(RepositoryError::Storage(format!("{}: {}", path.display(), e)));
            }
        };

        let mut retained = BTreeMap::new();
        let mut restored = 0;
        for (topic_id, topic) in history.topics {
            if inner.restore_history(&topic_id, topic.state, topic.speeches.clone()) {
                restored += 1;
            } else {
                warn!(topic_id = %topic_id, "history for unconfigured topic kept but not loaded");
                retained.insert(topic_id, topic);
            }
        }
        info!(path = %path.display(), topics = restored, "seminar history loaded");

        Ok(Self {
            inner,
            path,
            retained,
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut snapshot = HistoryFile {
            topics: self.retained.clone(),
        };
        for topic in self.inner.topics() {
            if topic.speeches.is_empty() && topic.state == TopicState::Preparing {
                continue;
            }
            snapshot.topics.insert(topic.id.clone(), TopicHistory::from(&topic));
        }

        let storage =
            |e: std::io::Error| RepositoryError::Storage(format!("{}: {}", self.path.display(), e));
        let data = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(storage)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await.map_err(storage)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage)?;

        debug!(path = %self.path.display(), topics = snapshot.topics.len(), "seminar history written");
        Ok(())
    }
}

#[async_trait]
impl SeminarRepository for JsonHistoryRepository {
    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, RepositoryError> {
        self.inner.get_topic(topic_id).await
    }

    async fn save_speech(&self, speech: &Speech) -> Result<(), RepositoryError> {
        self.inner.save_speech(speech).await?;
        self.persist().await
    }

    async fn save_topic_state(
        &self,
        topic_id: &str,
        state: TopicState,
    ) -> Result<(), RepositoryError> {
        self.inner.save_topic_state(topic_id, state).await?;
        self.persist().await
    }

    async fn get_roles(&self, role_ids: &[String]) -> Result<Vec<Role>, RepositoryError> {
        self.inner.get_roles(role_ids).await
    }
}
