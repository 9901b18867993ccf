//! Topic lock port: a lease keyed by topic id.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Topic {topic_id} is held by {holder}")]
    Held { topic_id: String, holder: String },

    #[error("Lease on topic {0} is not held by this owner")]
    NotHeld(String),

    #[error("Lock backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TopicLock: Send + Sync {
    /// Take the lease for `ttl`.
    ///
    /// Succeeds when the lease is free, expired or already held by `owner`
    /// (which refreshes it). Fails with `Held` otherwise.
    async fn acquire(&self, topic_id: &str, owner: &str, ttl: Duration) -> Result<(), LockError>;

    /// Extend a lease still held by `owner`; `NotHeld` if it was lost.
    async fn renew(&self, topic_id: &str, owner: &str, ttl: Duration) -> Result<(), LockError>;

    /// Release a lease held by `owner`; `NotHeld` leaves any other holder alone.
    async fn release(&self, topic_id: &str, owner: &str) -> Result<(), LockError>;

    /// Current live holder, if any
    async fn holder(&self, topic_id: &str) -> Result<Option<String>, LockError>;

    async fn is_held_by(&self, topic_id: &str, owner: &str) -> Result<bool, LockError> {
        Ok(self.holder(topic_id).await?.as_deref() == Some(owner))
    }
}
