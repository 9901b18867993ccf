//! Role domain
//!
//! A [`Role`] is a configured AI persona taking part in a seminar. Each topic
//! has exactly one [`RoleKind::Moderator`] and an ordered set of
//! [`RoleKind::Participant`]s. Roles are read-only for the duration of a run.

use serde::{Deserialize, Serialize};

/// Kind of a role within a topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Moderator,
    Participant,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Moderator => "moderator",
            RoleKind::Participant => "participant",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which model backs a role, and the credentials used to reach it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSelector {
    /// Model name as understood by the provider (e.g. "deepseek-chat")
    pub model: String,
    /// Provider API base URL; the gateway default is used when absent
    #[serde(default)]
    pub api_base: Option<String>,
    /// Provider API key; the gateway default is used when absent
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ModelSelector {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_base: None,
            api_key: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSelector")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A configured AI persona (Entity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    /// Display name; also the handle other roles use to address it (`@name`)
    pub name: String,
    /// Free-text behavioral description
    pub description: String,
    pub kind: RoleKind,
    pub model: ModelSelector,
}

impl Role {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: RoleKind,
        model: ModelSelector,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            kind,
            model,
        }
    }

    pub fn moderator(id: impl Into<String>, name: impl Into<String>, model: ModelSelector) -> Self {
        Self::new(id, name, RoleKind::Moderator, model)
    }

    pub fn participant(
        id: impl Into<String>,
        name: impl Into<String>,
        model: ModelSelector,
    ) -> Self {
        Self::new(id, name, RoleKind::Participant, model)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_moderator(&self) -> bool {
        self.kind == RoleKind::Moderator
    }
}
