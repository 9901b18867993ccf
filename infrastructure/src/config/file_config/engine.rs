//! Engine tuning from TOML (`[streaming]`, `[broker]`, `[lock]`, `[run]`)

use super::super::issue::ConfigIssue;
use seminar_application::{BrokerParams, RunParams, StreamingParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw `[streaming]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStreamingConfig {
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub cache_capacity: usize,
    pub delivery_timeout_ms: u64,
    pub viewer_channel_capacity: usize,
}

impl Default for FileStreamingConfig {
    fn default() -> Self {
        let params = StreamingParams::default();
        Self {
            batch_size: params.batch_size,
            flush_interval_ms: params.flush_interval.as_millis() as u64,
            cache_capacity: params.cache_capacity,
            delivery_timeout_ms: params.delivery_timeout.as_millis() as u64,
            viewer_channel_capacity: params.viewer_channel_capacity,
        }
    }
}

impl FileStreamingConfig {
    pub fn to_params(&self) -> StreamingParams {
        StreamingParams {
            batch_size: self.batch_size,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            cache_capacity: self.cache_capacity,
            delivery_timeout: Duration::from_millis(self.delivery_timeout_ms),
            viewer_channel_capacity: self.viewer_channel_capacity,
        }
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        let checks = [
            ("streaming.batch_size", self.batch_size as u64),
            ("streaming.flush_interval_ms", self.flush_interval_ms),
            ("streaming.cache_capacity", self.cache_capacity as u64),
            ("streaming.delivery_timeout_ms", self.delivery_timeout_ms),
            ("streaming.viewer_channel_capacity", self.viewer_channel_capacity as u64),
        ];
        for (field, value) in checks {
            if value == 0 {
                issues.push(ConfigIssue::zero(field));
            }
        }
    }
}

/// Raw `[broker]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBrokerConfig {
    pub partitions: usize,
    pub token_stream: String,
    pub pause_stream: String,
    pub group_prefix: String,
}

impl Default for FileBrokerConfig {
    fn default() -> Self {
        let params = BrokerParams::default();
        Self {
            partitions: 4,
            token_stream: params.token_stream,
            pause_stream: params.pause_stream,
            group_prefix: params.group_prefix,
        }
    }
}

impl FileBrokerConfig {
    pub fn to_params(&self) -> BrokerParams {
        BrokerParams {
            token_stream: self.token_stream.clone(),
            pause_stream: self.pause_stream.clone(),
            group_prefix: self.group_prefix.clone(),
        }
    }

    pub(super) fn validate(&self, issues: &mut Vec<ConfigIssue>) {
        use super::super::issue::ConfigIssueCode;

        if self.partitions == 0 {
            issues.push(ConfigIssue::zero("broker.partitions"));
        }
        for (field, value) in [
            ("broker.token_stream", &self.token_stream),
            ("broker.pause_stream", &self.pause_stream),
        ] {
            if value.trim().is_empty() {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyField {
                        field: field.to_string(),
                    },
                    format!("{} cannot be empty", field),
                ));
            }
        }
        if !self.token_stream.is_empty() && self.token_stream == self.pause_stream {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::DuplicateId {
                    section: "broker".to_string(),
                    id: self.token_stream.clone(),
                },
                "broker.token_stream and broker.pause_stream must be different streams",
            ));
        }
    }
}

/// Raw `[lock]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLockConfig {
    pub lease_ttl_secs: u64,
}

impl Default for FileLockConfig {
    fn default() -> Self {
        Self {
            lease_ttl_secs: RunParams::default().lease_ttl.as_secs(),
        }
    }
}

/// Raw `[run]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRunConfig {
    pub max_turns: usize,
    pub max_tool_rounds: usize,
    pub retrieval_top_k: usize,
}

impl Default for FileRunConfig {
    fn default() -> Self {
        let params = RunParams::default();
        Self {
            max_turns: params.max_turns,
            max_tool_rounds: params.max_tool_rounds,
            retrieval_top_k: params.retrieval_top_k,
        }
    }
}

impl FileRunConfig {
    pub fn to_params(&self, lock: &FileLockConfig) -> RunParams {
        RunParams {
            max_turns: self.max_turns,
            max_tool_rounds: self.max_tool_rounds,
            retrieval_top_k: self.retrieval_top_k,
            lease_ttl: Duration::from_secs(lock.lease_ttl_secs),
        }
    }

    pub(super) fn validate(&self, lock: &FileLockConfig, issues: &mut Vec<ConfigIssue>) {
        use super::super::issue::ConfigIssueCode;

        if self.max_turns == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::ZeroValue {
                    field: "run.max_turns".to_string(),
                },
                "run.max_turns is 0: every run stops before its first turn",
            ));
        }
        if lock.lease_ttl_secs == 0 {
            issues.push(ConfigIssue::zero("lock.lease_ttl_secs"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_application_params() {
        assert_eq!(FileStreamingConfig::default().to_params(), StreamingParams::default());
        assert_eq!(FileBrokerConfig::default().to_params(), BrokerParams::default());
        assert_eq!(
            FileRunConfig::default().to_params(&FileLockConfig::default()),
            RunParams::default()
        );
        assert_eq!(FileBrokerConfig::default().partitions, 4);
    }

    #[test]
    fn test_zero_values_are_reported() {
        let mut issues = Vec::new();
        FileStreamingConfig {
            batch_size: 0,
            flush_interval_ms: 0,
            ..Default::default()
        }
        .validate(&mut issues);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(ConfigIssue::is_error));
    }

    #[test]
    fn test_same_stream_twice() {
        let mut issues = Vec::new();
        FileBrokerConfig {
            pause_stream: "seminar-tokens".into(),
            ..Default::default()
        }
        .validate(&mut issues);
        assert_eq!(issues.len(), 1);
    }
}
