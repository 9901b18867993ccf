//! Persistence and retrieval adapters

pub mod history_file;
pub mod keyword_retriever;
pub mod memory_repository;

pub use history_file::JsonHistoryRepository;
pub use keyword_retriever::KeywordRetriever;
pub use memory_repository::InMemorySeminarRepository;
