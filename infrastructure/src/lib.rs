//! Infrastructure layer for seminar
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod catalog;
pub mod config;
pub mod coordination;
pub mod logging;
pub mod providers;
pub mod storage;
pub mod tools;

// Re-export commonly used types
pub use catalog::{CatalogError, load_documents, seed_repository};
pub use config::{ConfigIssue, ConfigLoader, FileConfig, Severity};
pub use coordination::{InMemoryBroker, InMemoryTopicLock};
pub use logging::JsonlConversationLogger;
pub use providers::{LlmDesignationExtractor, OpenAiGateway};
pub use storage::{InMemorySeminarRepository, JsonHistoryRepository, KeywordRetriever};
pub use tools::{ToolRegistry, default_registry};
