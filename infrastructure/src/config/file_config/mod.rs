//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application and domain
//! types by the `to_*` methods.

mod engine;
mod llm;
mod seminar;

pub use engine::{FileBrokerConfig, FileLockConfig, FileRunConfig, FileStreamingConfig};
pub use llm::FileLlmConfig;
pub use seminar::{
    FileDocumentConfig, FileRoleConfig, FileStorageConfig, FileTopicConfig, FileTranscriptConfig,
};

use super::issue::{ConfigIssue, ConfigIssueCode};
use seminar_application::SeminarParams;
use seminar_domain::RoleKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub llm: FileLlmConfig,
    pub streaming: FileStreamingConfig,
    pub broker: FileBrokerConfig,
    pub lock: FileLockConfig,
    pub run: FileRunConfig,
    pub roles: Vec<FileRoleConfig>,
    pub topics: Vec<FileTopicConfig>,
    pub documents: Vec<FileDocumentConfig>,
    pub transcript: FileTranscriptConfig,
    pub storage: FileStorageConfig,
}

impl FileConfig {
    /// Engine parameters for the application layer
    pub fn to_params(&self) -> SeminarParams {
        SeminarParams::default()
            .with_streaming(self.streaming.to_params())
            .with_broker(self.broker.to_params())
            .with_run(self.run.to_params(&self.lock))
    }

    pub fn topic(&self, topic_id: &str) -> Option<&FileTopicConfig> {
        self.topics.iter().find(|t| t.id == topic_id)
    }

    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Checks, in order:
    /// 1. engine sizes, intervals and limits
    /// 2. the `[llm]` section
    /// 3. role, topic and document ids are unique
    /// 4. every topic's moderator, participants and documents resolve
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        self.streaming.validate(&mut issues);
        self.broker.validate(&mut issues);
        self.run.validate(&self.lock, &mut issues);

        if self.llm.extraction_model.trim().is_empty() {
            issues.push(empty("llm.extraction_model"));
        }

        let roles = unique_by_id(
            "roles",
            self.roles.iter().map(|r| (r.id.as_str(), r)),
            &mut issues,
        );
        unique_by_id(
            "topics",
            self.topics.iter().map(|t| (t.id.as_str(), t)),
            &mut issues,
        );
        let documents = unique_by_id(
            "documents",
            self.documents.iter().map(|d| (d.id.as_str(), d)),
            &mut issues,
        );

        for role in &self.roles {
            if role.model.trim().is_empty() {
                issues.push(empty(&format!("roles[{}].model", role.id)));
            }
            if role.name.trim().is_empty() {
                issues.push(empty(&format!("roles[{}].name", role.id)));
            }
        }
        for document in &self.documents {
            if document.path.is_none() && document.text.is_none() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::MissingDocumentSource {
                        document: document.id.clone(),
                    },
                    format!("document '{}' needs either `path` or `text`", document.id),
                ));
            }
        }

        for topic in &self.topics {
            validate_topic(topic, &roles, &documents, &mut issues);
        }

        issues
    }
}

fn empty(field: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::EmptyField {
            field: field.to_string(),
        },
        format!("{} cannot be empty", field),
    )
}

fn unique_by_id<'a, T>(
    section: &str,
    entries: impl Iterator<Item = (&'a str, &'a T)>,
    issues: &mut Vec<ConfigIssue>,
) -> HashMap<&'a str, &'a T> {
    let mut seen = HashMap::new();
    for (id, entry) in entries {
        if seen.insert(id, entry).is_some() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateId {
                    section: section.to_string(),
                    id: id.to_string(),
                },
                format!("duplicate id '{}' in [[{}]]", id, section),
            ));
        }
    }
    seen
}

fn validate_topic(
    topic: &FileTopicConfig,
    roles: &HashMap<&str, &FileRoleConfig>,
    documents: &HashMap<&str, &FileDocumentConfig>,
    issues: &mut Vec<ConfigIssue>,
) {
    if topic.subject.trim().is_empty() {
        issues.push(empty(&format!("topics[{}].subject", topic.id)));
    }
    if topic.participants.is_empty() {
        issues.push(empty(&format!("topics[{}].participants", topic.id)));
    }

    let undefined = |role: &str| {
        ConfigIssue::error(
            ConfigIssueCode::UndefinedRole {
                topic: topic.id.clone(),
                role: role.to_string(),
            },
            format!("topic '{}' references undefined role '{}'", topic.id, role),
        )
    };
    let wrong_kind = |role: &str, expected: RoleKind| {
        ConfigIssue::error(
            ConfigIssueCode::WrongRoleKind {
                topic: topic.id.clone(),
                role: role.to_string(),
            },
            format!(
                "topic '{}' uses role '{}' as {}, but it is not one",
                topic.id, role, expected
            ),
        )
    };

    match roles.get(topic.moderator.as_str()) {
        None => issues.push(undefined(&topic.moderator)),
        Some(role) if role.kind != RoleKind::Moderator => {
            issues.push(wrong_kind(&topic.moderator, RoleKind::Moderator))
        }
        Some(_) => {}
    }

    let mut names = HashSet::new();
    for id in &topic.participants {
        match roles.get(id.as_str()) {
            None => issues.push(undefined(id)),
            Some(role) if role.kind != RoleKind::Participant => {
                issues.push(wrong_kind(id, RoleKind::Participant))
            }
            Some(role) => {
                if !names.insert(role.name.as_str()) {
                    issues.push(ConfigIssue::error(
                        ConfigIssueCode::AmbiguousName {
                            topic: topic.id.clone(),
                            name: role.name.clone(),
                        },
                        format!(
                            "topic '{}' has two participants named '{}'; designation cannot tell them apart",
                            topic.id, role.name
                        ),
                    ));
                }
            }
        }
    }

    for document in &topic.documents {
        if !documents.contains_key(document.as_str()) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::UndefinedDocument {
                    topic: topic.id.clone(),
                    document: document.clone(),
                },
                format!(
                    "topic '{}' references undefined document '{}'; it will be skipped",
                    topic.id, document
                ),
            ));
        }
    }
}
