//! Seminar parameters: run-loop, streaming and coordination control.
//!
//! [`SeminarParams`] groups the static parameters the application layer
//! needs. They are built from file configuration by the infrastructure
//! layer; the application never reads files or the environment itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token batching and viewer delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingParams {
    /// Fragments per batch before `add` reports the threshold crossed
    pub batch_size: usize,
    /// Timer flush period of the token buffer
    pub flush_interval: Duration,
    /// Maximum cached messages per topic for late joiners
    pub cache_capacity: usize,
    /// Upper wait bound when a viewer's channel is full
    pub delivery_timeout: Duration,
    /// Bounded channel size per viewer connection
    pub viewer_channel_capacity: usize,
}

impl Default for StreamingParams {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_millis(50),
            cache_capacity: 512,
            delivery_timeout: Duration::from_millis(500),
            viewer_channel_capacity: 50,
        }
    }
}

/// Broker stream names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerParams {
    pub token_stream: String,
    pub pause_stream: String,
    /// Reader groups are `<prefix>-<replica id>` so every replica sees every record
    pub group_prefix: String,
}

impl Default for BrokerParams {
    fn default() -> Self {
        Self {
            token_stream: "seminar-tokens".to_string(),
            pause_stream: "seminar-pause".to_string(),
            group_prefix: "seminar".to_string(),
        }
    }
}

impl BrokerParams {
    pub fn group_for(&self, replica_id: &str) -> String {
        format!("{}-{}", self.group_prefix, replica_id)
    }
}

/// Run-loop limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    /// Completed turns per `run_topic` call before the run parks itself
    pub max_turns: usize,
    /// Model/tool round trips within one turn
    pub max_tool_rounds: usize,
    /// Snippets requested per reference document
    pub retrieval_top_k: usize,
    /// Lease validity; renewed every third of it
    pub lease_ttl: Duration,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            max_turns: 100,
            max_tool_rounds: 5,
            retrieval_top_k: 8,
            lease_ttl: Duration::from_secs(30),
        }
    }
}

impl RunParams {
    pub fn renew_interval(&self) -> Duration {
        self.lease_ttl / 3
    }
}

/// All parameters for the seminar service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeminarParams {
    pub streaming: StreamingParams,
    pub broker: BrokerParams,
    pub run: RunParams,
}

impl SeminarParams {
    // ==================== Builder Methods ====================

    pub fn with_streaming(mut self, streaming: StreamingParams) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_broker(mut self, broker: BrokerParams) -> Self {
        self.broker = broker;
        self
    }

    pub fn with_run(mut self, run: RunParams) -> Self {
        self.run = run;
        self
    }

    pub fn with_max_turns(mut self, max: usize) -> Self {
        self.run.max_turns = max;
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.run.lease_ttl = ttl;
        self
    }
}
