//! Streaming: batching model output before it reaches the broker.

pub mod token_buffer;

pub use token_buffer::{BatchSender, TokenBuffer};
