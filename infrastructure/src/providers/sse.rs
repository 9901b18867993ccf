//! OpenAI-compatible SSE chunk decoding.
//!
//! Turns the `data:` payloads of a `chat.completion.chunk` stream into
//! [`StreamEvent`]s. Tool-call fragments arrive split across chunks and are
//! accumulated by their `index` until the model finishes.

use seminar_domain::{StreamEvent, ToolCall};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{trace, warn};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ChunkData {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    /// DeepSeek-style reasoning stream
    #[serde(default, alias = "reasoning")]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCallDelta>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

fn api_error_message(event: &Value) -> Option<String> {
    let error = event.get("error")?;
    if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }
    Some("provider reported an error".to_string())
}

/// Stateful decoder for one streamed completion.
#[derive(Debug, Default)]
pub struct ChunkDecoder {
    pending_calls: BTreeMap<usize, PartialToolCall>,
    finished: bool,
    done: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the completion has been fully emitted
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode one SSE `data` payload.
    ///
    /// Returns `Err` with a message when the provider reports an error or
    /// sends a payload that is not JSON.
    pub fn decode(&mut self, data: &str) -> Result<Vec<StreamEvent>, String> {
        if self.done {
            return Ok(Vec::new());
        }
        let data = data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data == DONE_SENTINEL {
            return Ok(self.finish());
        }

        let event: Value =
            serde_json::from_str(data).map_err(|e| format!("invalid SSE payload: {}", e))?;
        if let Some(message) = api_error_message(&event) {
            return Err(message);
        }
        let chunk: ChunkData = match serde_json::from_value(event) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "skipping unrecognised SSE chunk");
                return Ok(Vec::new());
            }
        };
        trace!(?chunk, "SSE chunk");

        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(reasoning) = choice.delta.reasoning_content
                && !reasoning.is_empty()
            {
                events.push(StreamEvent::Reasoning(reasoning));
            }
            if let Some(content) = choice.delta.content
                && !content.is_empty()
            {
                events.push(StreamEvent::Delta(content));
            }
            for fragment in choice.delta.tool_calls {
                let call = self.pending_calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    call.id = id;
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        call.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        call.arguments.push_str(&arguments);
                    }
                }
            }
            if choice.finish_reason.is_some() {
                self.finished = true;
            }
        }
        Ok(events)
    }

    /// Close the completion: emit accumulated tool calls, then `Completed`.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        self.done = true;
        let mut events = Vec::new();
        let calls: Vec<ToolCall> = std::mem::take(&mut self.pending_calls)
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| {
                let id = if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                };
                ToolCall::new(id, call.name, call.arguments)
            })
            .collect();
        if !calls.is_empty() {
            events.push(StreamEvent::ToolCalls(calls));
        }
        events.push(StreamEvent::Completed);
        events
    }

    /// The body ended without `[DONE]`.
    ///
    /// A completion that reported a finish reason is closed normally;
    /// anything else is a truncated stream.
    pub fn end_of_stream(&mut self) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        if self.finished {
            return self.finish();
        }
        self.done = true;
        vec![StreamEvent::Error(
            "stream closed before the response completed".to_string(),
        )]
    }
}
