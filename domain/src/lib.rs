//! Domain layer for seminar-orchestrator
//!
//! Entities, value objects and pure state machines for running a moderated
//! multi-role AI seminar. No I/O, no async: everything here is deterministic
//! and is driven by the application layer.
//!
//! # Core Concepts
//!
//! ## Topic
//!
//! A [`Topic`] is a seminar session: a subject, one moderator, an ordered set
//! of participants and the speeches made so far. Its lifecycle
//! ([`TopicState`]) is `Preparing -> Running <-> Paused`.
//!
//! ## Turn-taking
//!
//! [`RoleScheduler`] alternates moderator and participant turns. The moderator
//! designates the next participant by name; every participant hands the floor
//! back to the moderator.
//!
//! ## Broadcast
//!
//! [`TokenMessage`] is the unit streamed to live viewers while a turn is being
//! generated.

pub mod broadcast;
pub mod core;
pub mod prompt;
pub mod role;
pub mod scheduler;
pub mod session;
pub mod tool;
pub mod topic;

// Re-export commonly used types
pub use broadcast::{ContentType, TokenMessage};
pub use core::{error::DomainError, signal::StateSignal};
pub use prompt::{ADMINISTRATOR_NAME, SeminarPrompt};
pub use role::{ModelSelector, Role, RoleKind};
pub use scheduler::{RoleScheduler, SchedulerState};
pub use session::{
    entities::{Message, MessageRole},
    stream::StreamEvent,
};
pub use tool::{ToolCall, ToolDescriptor};
pub use topic::{
    entities::{Speech, Topic},
    lifecycle::{LifecycleAction, TopicState},
};
