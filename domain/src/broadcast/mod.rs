//! Broadcast domain: streamed token fragments delivered to viewers.

use crate::role::{Role, RoleKind};
use serde::{Deserialize, Serialize};

/// Content type of a streamed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Part of the model's reasoning trace
    Reasoning,
    /// Visible speech text
    Text,
    /// The run stopped producing output; viewers may close their streams
    End,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Reasoning => "reasoning",
            ContentType::Text => "text",
            ContentType::End => "end",
        }
    }
}

/// One streamed fragment attributed to a role within a turn.
///
/// Ephemeral: lives only in the broker log and the viewer catch-up cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMessage {
    pub topic_id: String,
    pub role_id: String,
    #[serde(default)]
    pub role_name: String,
    pub role_kind: Option<RoleKind>,
    pub content_type: ContentType,
    pub content: String,
    /// Ordering hint, monotonically increasing within one run of a topic
    pub position: u64,
}

impl TokenMessage {
    pub fn new(
        topic_id: impl Into<String>,
        role: &Role,
        content_type: ContentType,
        content: impl Into<String>,
        position: u64,
    ) -> Self {
        Self {
            topic_id: topic_id.into(),
            role_id: role.id.clone(),
            role_name: role.name.clone(),
            role_kind: Some(role.kind),
            content_type,
            content: content.into(),
            position,
        }
    }

    /// End-of-stream marker for a topic.
    pub fn end(topic_id: impl Into<String>, role_id: impl Into<String>, position: u64) -> Self {
        Self {
            topic_id: topic_id.into(),
            role_id: role_id.into(),
            role_name: String::new(),
            role_kind: None,
            content_type: ContentType::End,
            content: String::new(),
            position,
        }
    }

    pub fn is_end(&self) -> bool {
        self.content_type == ContentType::End
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::ModelSelector;

    #[test]
    fn test_token_message_wire_format() {
        let role = Role::participant("r1", "Alice", ModelSelector::new("m"));
        let msg = TokenMessage::new("t1", &role, ContentType::Reasoning, "hmm", 3);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["topic_id"], "t1");
        assert_eq!(json["role_id"], "r1");
        assert_eq!(json["role_name"], "Alice");
        assert_eq!(json["role_kind"], "participant");
        assert_eq!(json["content_type"], "reasoning");
        assert_eq!(json["position"], 3);
    }

    #[test]
    fn test_end_marker() {
        let msg = TokenMessage::end("t1", "r1", 9);
        assert!(msg.is_end());
        assert!(msg.content.is_empty());
        assert_eq!(msg.content_type.as_str(), "end");
    }
}
