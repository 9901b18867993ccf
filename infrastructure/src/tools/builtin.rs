//! Built-in tools available to every role.

use super::registry::{SeminarTool, ToolRegistry};
use async_trait::async_trait;
use seminar_application::ports::retrieval::DocumentRetriever;
use seminar_application::ports::tool_executor::ToolError;
use seminar_domain::ToolDescriptor;
use serde_json::{Value, json};
use std::sync::Arc;

/// Current date and time in UTC, RFC 3339.
pub struct CurrentTimeTool;

#[async_trait]
impl SeminarTool for CurrentTimeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "current_time",
            "Get the current date and time (UTC, RFC 3339).",
        )
    }

    async fn call(&self, _arguments: Value) -> Result<String, ToolError> {
        Ok(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

/// Look up passages in one of the seminar's reference documents.
pub struct SearchDocumentsTool {
    retriever: Arc<dyn DocumentRetriever>,
    top_k: usize,
}

impl SearchDocumentsTool {
    pub fn new(retriever: Arc<dyn DocumentRetriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }
}

#[async_trait]
impl SeminarTool for SearchDocumentsTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "search_documents",
            "Search a reference document for passages matching a query.",
        )
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "document_id": { "type": "string", "description": "Reference document id" },
                "query": { "type": "string", "description": "Keywords to look for" }
            },
            "required": ["document_id", "query"]
        }))
    }

    async fn call(&self, arguments: Value) -> Result<String, ToolError> {
        let field = |name: &str| {
            arguments[name]
                .as_str()
                .map(String::from)
                .ok_or_else(|| ToolError::InvalidArguments(format!("{} is required", name)))
        };
        let document_id = field("document_id")?;
        let query = field("query")?;

        let snippets = self
            .retriever
            .retrieve(&document_id, &query, self.top_k)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        if snippets.is_empty() {
            return Ok("No matching passages.".to_string());
        }
        Ok(snippets.join("\n\n"))
    }
}

/// Registry with [`CurrentTimeTool`] and, when a retriever is given,
/// [`SearchDocumentsTool`].
pub fn default_registry(retriever: Option<Arc<dyn DocumentRetriever>>, top_k: usize) -> ToolRegistry {
    let registry = ToolRegistry::new().register(CurrentTimeTool);
    match retriever {
        Some(retriever) => registry.register(SearchDocumentsTool::new(retriever, top_k)),
        None => registry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeywordRetriever;
    use seminar_application::ports::tool_executor::ToolExecutorPort;
    use seminar_domain::ToolCall;

    #[tokio::test]
    async fn test_current_time_is_rfc3339() {
        let out = CurrentTimeTool.call(json!({})).await.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&out).is_ok());
    }

    #[tokio::test]
    async fn test_search_documents() {
        let retriever = Arc::new(KeywordRetriever::new());
        retriever.insert("kant", "Duty comes first.\n\nHappiness is secondary.");
        let registry = default_registry(Some(retriever), 4);
        assert!(registry.has_tool("search_documents"));

        let out = registry
            .invoke(&ToolCall::new(
                "c1",
                "search_documents",
                r#"{"document_id": "kant", "query": "duty"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(out, "Duty comes first.");

        let none = registry
            .invoke(&ToolCall::new(
                "c2",
                "search_documents",
                r#"{"document_id": "kant", "query": "quantum"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(none, "No matching passages.");

        let missing = registry
            .invoke(&ToolCall::new(
                "c3",
                "search_documents",
                r#"{"document_id": "hume", "query": "duty"}"#,
            ))
            .await;
        assert!(matches!(missing, Err(ToolError::ExecutionFailed(_))));
    }

    #[test]
    fn test_default_registry_without_documents() {
        let registry = default_registry(None, 4);
        let names: Vec<_> = registry.descriptors().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["current_time"]);
    }
}
