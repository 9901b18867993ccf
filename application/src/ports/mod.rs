//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod broker;
pub mod conversation_logger;
pub mod designation;
pub mod llm_gateway;
pub mod repository;
pub mod retrieval;
pub mod tool_executor;
pub mod topic_lock;
