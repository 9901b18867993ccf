//! Topic domain.
//!
//! - [`entities::Topic`]: one moderated discussion and its speech history
//! - [`entities::Speech`]: one completed turn
//! - [`lifecycle::TopicState`]: Preparing / Running / Paused state machine

pub mod entities;
pub mod lifecycle;
