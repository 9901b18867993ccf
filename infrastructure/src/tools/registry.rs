//! Tool Registry
//!
//! The [`ToolRegistry`] collects [`SeminarTool`]s and implements
//! [`ToolExecutorPort`]: it hands their descriptors to every turn and routes
//! each model-issued [`ToolCall`] to the tool of the same name.
//!
//! ```ignore
//! let registry = ToolRegistry::new()
//!     .register(CurrentTimeTool)
//!     .register(SearchDocumentsTool::new(retriever));
//! assert!(registry.has_tool("current_time"));
//! ```

use async_trait::async_trait;
use seminar_application::ports::tool_executor::{ToolError, ToolExecutorPort};
use seminar_domain::{ToolCall, ToolDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One invocable tool
#[async_trait]
pub trait SeminarTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Run with already-parsed JSON arguments
    async fn call(&self, arguments: Value) -> Result<String, ToolError>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn SeminarTool>>,
    /// Registration order, for stable descriptor lists
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later tool with the same name replaces the earlier one
    pub fn register<T: SeminarTool + 'static>(self, tool: T) -> Self {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(mut self, tool: Arc<dyn SeminarTool>) -> Self {
        let name = tool.descriptor().name;
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolExecutorPort for ToolRegistry {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor())
            .collect()
    }

    fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        let arguments = call
            .parsed_arguments()
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        debug!(tool = %call.name, call_id = %call.id, "invoking tool");
        tool.call(arguments).await
    }
}
