//! Tool domain module
//!
//! Roles may call tools while producing a turn. A [`ToolDescriptor`] tells
//! the model what it can call; the model answers with [`ToolCall`]s that the
//! application dispatches through its tool-executor port and feeds back as
//! tool-result messages until a response contains no further calls.

pub mod entities;

pub use entities::{ToolCall, ToolDescriptor};
