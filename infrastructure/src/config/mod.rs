//! Configuration file loading for seminar
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `SEMINAR_*` environment variables (`__` separates section and key)
//! 2. `--config <path>` specified file
//! 3. Project root: `./seminar.toml` or `./.seminar.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/seminar/config.toml`
//! 5. Default values

mod file_config;
mod issue;
mod loader;

pub use file_config::{
    FileBrokerConfig, FileConfig, FileDocumentConfig, FileLlmConfig, FileLockConfig,
    FileRoleConfig, FileRunConfig, FileStorageConfig, FileStreamingConfig, FileTopicConfig,
    FileTranscriptConfig,
};
pub use issue::{ConfigIssue, ConfigIssueCode, Severity};
pub use loader::ConfigLoader;
