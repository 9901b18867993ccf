//! Coordination adapters: message broker and topic lease.

pub mod memory_broker;
pub mod memory_lock;

pub use memory_broker::InMemoryBroker;
pub use memory_lock::InMemoryTopicLock;
