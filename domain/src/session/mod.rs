//! Language-model session domain.
//!
//! - [`entities::Message`]: a single chat message
//! - [`stream::StreamEvent`]: one event of a streaming response

pub mod entities;
pub mod stream;
