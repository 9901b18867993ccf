//! Tool Executor port
//!
//! Defines the interface for executing tools requested by a role mid-turn.

use async_trait::async_trait;
use seminar_domain::{ToolCall, ToolDescriptor};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Port for tool execution
///
/// This port defines how the application layer executes tools.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// Descriptors of every available tool, bound to the model on each turn
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    /// Check if a tool is available
    fn has_tool(&self, name: &str) -> bool {
        self.descriptors().iter().any(|d| d.name == name)
    }

    /// Execute a tool call and return its textual result
    async fn invoke(&self, call: &ToolCall) -> Result<String, ToolError>;
}

/// Executor with no tools; tool calling is disabled for every turn.
pub struct NoTools;

#[async_trait]
impl ToolExecutorPort for NoTools {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}
