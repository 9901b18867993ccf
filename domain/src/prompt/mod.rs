//! Prompt domain
//!
//! Framings and history formatting handed to the language model on each turn.

mod template;

pub use template::{ADMINISTRATOR_NAME, SeminarPrompt};
