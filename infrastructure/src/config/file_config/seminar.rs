//! Seminar content from TOML (`[[roles]]`, `[[topics]]`, `[[documents]]`, `[transcript]`, `[storage]`)

use super::llm::read_key;
use seminar_domain::{DomainError, ModelSelector, Role, RoleKind, Topic};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One `[[roles]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRoleConfig {
    pub id: String,
    /// Display name, also the `@handle` other roles use
    pub name: String,
    pub kind: RoleKind,
    #[serde(default)]
    pub description: String,
    pub model: String,
    /// Overrides `[llm].base_url` for this role
    #[serde(default)]
    pub api_base: Option<String>,
    /// Environment variable holding this role's API key
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl FileRoleConfig {
    pub fn to_role(&self) -> Role {
        let mut selector = ModelSelector::new(self.model.clone());
        if let Some(base) = &self.api_base {
            selector = selector.with_api_base(base.clone());
        }
        if let Some(key) = self.api_key_env.as_deref().and_then(read_key) {
            selector = selector.with_api_key(key);
        }
        Role::new(self.id.clone(), self.name.clone(), self.kind, selector)
            .with_description(self.description.clone())
    }
}

/// One `[[topics]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTopicConfig {
    pub id: String,
    pub subject: String,
    #[serde(default)]
    pub owner: String,
    /// Role id of the moderator
    pub moderator: String,
    /// Participant role ids, in order
    pub participants: Vec<String>,
    /// Reference document ids
    #[serde(default)]
    pub documents: Vec<String>,
}

impl FileTopicConfig {
    pub fn to_topic(&self) -> Result<Topic, DomainError> {
        Ok(Topic::new(
            self.id.clone(),
            self.subject.clone(),
            self.moderator.clone(),
            self.participants.clone(),
        )?
        .with_owner(self.owner.clone())
        .with_documents(self.documents.clone()))
    }
}

/// One `[[documents]]` entry: inline `text` or a UTF-8 file at `path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDocumentConfig {
    pub id: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Raw `[transcript]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTranscriptConfig {
    /// JSONL transcript file; no transcript when unset
    pub path: Option<PathBuf>,
}

/// Raw `[storage]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// JSON file holding speeches and topic states across runs; history
    /// lives only in memory when unset
    pub history_path: Option<PathBuf>,
}
