//! LLM Gateway port
//!
//! Defines the interface for communicating with language-model providers.

use async_trait::async_trait;
use seminar_domain::{Message, ModelSelector, StreamEvent, ToolDescriptor};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout")]
    Timeout,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

impl GatewayError {
    /// Check if this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GatewayError::Cancelled)
    }
}

/// Handle for receiving streaming events from a chat model.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect the visible text into a single string.
    ///
    /// Reasoning fragments and tool-call requests are ignored. A channel that
    /// closes without `Completed` is a failure, not a short answer.
    pub async fn collect_text(mut self) -> Result<String, GatewayError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed => return Ok(full_text),
                StreamEvent::Error(e) => return Err(GatewayError::RequestFailed(e)),
                StreamEvent::Reasoning(_) | StreamEvent::ToolCalls(_) => {}
            }
        }
        Err(GatewayError::RequestFailed(
            "stream closed before completion".to_string(),
        ))
    }
}

/// A chat model bound to one role's credentials.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model name, for logging
    fn model_name(&self) -> &str;

    /// Start a streaming completion.
    ///
    /// `tools` is the set of tools bound for this request; an empty slice
    /// disables tool calling. The stream ends with `Completed` on natural
    /// completion, `Error` on transport failure, or simply closes once
    /// `cancel` fires.
    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError>;
}

/// Gateway for LLM communication
///
/// This port defines how the application layer obtains chat models.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Get a chat model for the given selector
    async fn chat_model(&self, selector: &ModelSelector) -> Result<Arc<dyn ChatModel>, GatewayError>;
}
