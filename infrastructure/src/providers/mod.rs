//! Language-model adapters
//!
//! - [`OpenAiGateway`]: streaming chat over any OpenAI-compatible endpoint
//! - [`LlmDesignationExtractor`]: next-speaker extraction via an auxiliary model

pub mod designation;
pub mod openai;
pub mod sse;

pub use designation::LlmDesignationExtractor;
pub use openai::{DEFAULT_BASE_URL, OpenAiChatModel, OpenAiGateway};
pub use sse::ChunkDecoder;
