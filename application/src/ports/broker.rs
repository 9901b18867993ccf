//! Message broker port
//!
//! A partitioned, append-only log with per-key ordering and reader groups.
//! Two logical streams run over it: batched token messages for viewers and
//! pause markers for whichever replica drives a topic.
//!
//! # Semantics expected of adapters
//!
//! - A record's partition is a pure function of its key, so every record
//!   with the same key lands in the same partition, in publish order.
//! - All payloads of one `publish` call are appended contiguously.
//! - Each `(stream, group, partition)` reader has its own committed offset;
//!   a group that has never read a partition starts at its current end.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker closed")]
    Closed,

    #[error("Read cancelled")]
    Cancelled,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Read failed: {0}")]
    Read(String),
}

impl BrokerError {
    /// Whether the consumer should stop rather than retry
    pub fn is_terminal(&self) -> bool {
        matches!(self, BrokerError::Closed | BrokerError::Cancelled)
    }
}

/// One record read from a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub key: String,
    pub value: Vec<u8>,
    pub partition: usize,
    pub offset: u64,
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Number of partitions per stream
    fn partitions(&self) -> usize;

    /// Append `payloads` under `key`, in order
    async fn publish(&self, stream: &str, key: &str, payloads: Vec<Vec<u8>>)
    -> Result<(), BrokerError>;

    /// Open a reader for one partition of `stream` on behalf of `group`
    async fn subscribe(
        &self,
        stream: &str,
        group: &str,
        partition: usize,
    ) -> Result<Box<dyn BrokerReader>, BrokerError>;
}

#[async_trait]
pub trait BrokerReader: Send {
    /// Wait for the next record, committing the group offset past it.
    ///
    /// Returns `Cancelled` once `cancel` fires and `Closed` once the broker
    /// shuts down.
    async fn read(&mut self, cancel: &CancellationToken) -> Result<BrokerRecord, BrokerError>;
}
