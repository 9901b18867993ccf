//! OpenAI-compatible chat gateway
//!
//! Works with any provider exposing `POST {base}/chat/completions` with
//! `stream: true` (OpenAI, DeepSeek, vLLM, Ollama's compatibility layer).
//! Each role's [`ModelSelector`] may override the base URL and key.

use super::sse::ChunkDecoder;
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use seminar_application::ports::llm_gateway::{ChatModel, GatewayError, LlmGateway, StreamHandle};
use seminar_domain::{Message, MessageRole, ModelSelector, StreamEvent, ToolDescriptor};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Gateway handing out [`OpenAiChatModel`]s that share one HTTP client.
pub struct OpenAiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl OpenAiGateway {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound on waiting for response headers and on silence mid-stream
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[async_trait]
impl LlmGateway for OpenAiGateway {
    async fn chat_model(&self, selector: &ModelSelector) -> Result<Arc<dyn ChatModel>, GatewayError> {
        if selector.model.trim().is_empty() {
            return Err(GatewayError::ModelNotAvailable(
                "empty model name".to_string(),
            ));
        }
        Ok(Arc::new(OpenAiChatModel {
            client: self.client.clone(),
            base_url: selector
                .api_base
                .clone()
                .unwrap_or_else(|| self.base_url.clone()),
            api_key: selector.api_key.clone().or_else(|| self.api_key.clone()),
            model: selector.model.clone(),
            request_timeout: self.request_timeout,
        }))
    }
}

pub struct OpenAiChatModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    request_timeout: Duration,
}

impl OpenAiChatModel {
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Value {
        let mut body = json!({
            "model": self.model,
            "stream": true,
            "messages": messages.iter().map(wire_message).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = tools.iter().map(wire_tool).collect::<Vec<_>>().into();
        }
        body
    }
}

fn wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = message
            .tool_calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": { "name": call.name, "arguments": call.arguments },
                })
            })
            .collect::<Vec<_>>()
            .into();
    }
    if message.role == MessageRole::Tool
        && let Some(id) = &message.tool_call_id
    {
        wire["tool_call_id"] = id.clone().into();
    }
    wire
}

fn wire_tool(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        },
    })
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header("Accept", "text/event-stream")
            .json(&self.request_body(messages, tools));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        debug!(model = %self.model, messages = messages.len(), tools = tools.len(), "sending chat request");
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GatewayError::Cancelled),
            sent = tokio::time::timeout(self.request_timeout, request.send()) => match sent {
                Err(_) => return Err(GatewayError::Timeout),
                Ok(Err(e)) => return Err(GatewayError::ConnectionError(e.to_string())),
                Ok(Ok(response)) => response,
            },
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %self.model, %status, "chat request rejected");
            return Err(match status.as_u16() {
                404 => GatewayError::ModelNotAvailable(self.model.clone()),
                _ => GatewayError::RequestFailed(format!("HTTP {}: {}", status, body)),
            });
        }

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let model = self.model.clone();
        let idle_timeout = self.request_timeout;
        tokio::spawn(async move {
            let mut events = response.bytes_stream().eventsource();
            let mut decoder = ChunkDecoder::new();
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(model = %model, "chat stream cancelled");
                        return;
                    }
                    next = tokio::time::timeout(idle_timeout, events.next()) => next,
                };

                let (batch, stop) = match next {
                    Err(_) => (
                        vec![StreamEvent::Error(format!(
                            "no data for {}s",
                            idle_timeout.as_secs()
                        ))],
                        true,
                    ),
                    Ok(None) => (decoder.end_of_stream(), true),
                    Ok(Some(Err(e))) => (vec![StreamEvent::Error(format!("SSE stream error: {}", e))], true),
                    Ok(Some(Ok(event))) => match decoder.decode(&event.data) {
                        Ok(batch) => (batch, decoder.is_done()),
                        Err(message) => (vec![StreamEvent::Error(message)], true),
                    },
                };

                for event in batch {
                    if let StreamEvent::Error(e) = &event {
                        warn!(model = %model, error = %e, "chat stream failed");
                    }
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                if stop {
                    info!(model = %model, "chat stream finished");
                    return;
                }
            }
        });

        Ok(StreamHandle::new(rx))
    }
}
