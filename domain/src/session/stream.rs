//! Streaming events for language-model communication.
//!
//! [`StreamEvent`] represents individual events in a streaming chat
//! response. Reasoning and visible text arrive as separate variants so they
//! can be broadcast with distinct content types.

use crate::tool::entities::ToolCall;

/// An event in a streaming chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of the model's reasoning trace.
    Reasoning(String),
    /// A fragment of visible text.
    Delta(String),
    /// Fully assembled tool-call requests for this response.
    ///
    /// Providers stream tool calls in pieces; adapters accumulate them and
    /// emit a single event once the calls are complete.
    ToolCalls(Vec<ToolCall>),
    /// Natural end of the response.
    Completed,
    /// A transport or provider error; terminal.
    Error(String),
}

impl StreamEvent {
    /// Returns the text content if this is a `Delta` event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed | StreamEvent::Error(_))
    }
}
