//! Application use cases

pub mod execute_turn;
pub mod run_topic;
