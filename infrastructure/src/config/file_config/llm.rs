//! LLM provider configuration from TOML (`[llm]` section)

use crate::providers::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw LLM provider configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    /// OpenAI-compatible API base URL, used by roles that do not set their own
    pub base_url: String,
    /// Environment variable holding the default API key
    pub api_key_env: String,
    /// Model used to extract the next speaker from moderator turns
    pub extraction_model: String,
    /// Bound on waiting for response headers and on mid-stream silence
    pub request_timeout_secs: u64,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            extraction_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl FileLlmConfig {
    /// Default API key, read from `api_key_env`
    pub fn api_key(&self) -> Option<String> {
        read_key(&self.api_key_env)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Read a non-empty key from the named environment variable
pub(crate) fn read_key(var: &str) -> Option<String> {
    if var.is_empty() {
        return None;
    }
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}
