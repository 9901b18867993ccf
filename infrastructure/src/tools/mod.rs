//! Tools that roles may call mid-turn
//!
//! - `registry`: [`ToolRegistry`], the [`ToolExecutorPort`](seminar_application::ToolExecutorPort) adapter
//! - `builtin`: tools every deployment gets (`current_time`, `search_documents`)

pub mod builtin;
mod registry;

pub use builtin::{CurrentTimeTool, SearchDocumentsTool, default_registry};
pub use registry::{SeminarTool, ToolRegistry};
