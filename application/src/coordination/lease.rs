//! Lease ownership for one topic run.
//!
//! [`LeaseGuard`] takes the topic lease, renews it every third of its TTL in
//! the background, and exposes a `lost` token that fires once renewal finds
//! the lease in someone else's hands. Lock backend errors are logged and
//! tolerated; only a definite loss of ownership counts as lost.

use crate::ports::topic_lock::{LockError, TopicLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct LeaseGuard {
    lock: Arc<dyn TopicLock>,
    topic_id: String,
    owner: String,
    lost: CancellationToken,
    stop: CancellationToken,
    renewal: Option<JoinHandle<()>>,
}

impl LeaseGuard {
    /// Acquire the lease and start renewing it.
    ///
    /// Fails only when another owner holds a live lease.
    pub async fn acquire(
        lock: Arc<dyn TopicLock>,
        topic_id: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<Self, LockError> {
        match lock.acquire(topic_id, owner, ttl).await {
            Ok(()) => info!(topic_id, owner, "topic lease acquired"),
            Err(e @ LockError::Held { .. }) => return Err(e),
            Err(e) => warn!(topic_id, owner, error = %e, "topic lease not confirmed, continuing"),
        }

        let lost = CancellationToken::new();
        let stop = CancellationToken::new();
        let renewal = tokio::spawn(renew_loop(
            Arc::clone(&lock),
            topic_id.to_string(),
            owner.to_string(),
            ttl,
            lost.clone(),
            stop.clone(),
        ));

        Ok(Self {
            lock,
            topic_id: topic_id.to_string(),
            owner: owner.to_string(),
            lost,
            stop,
            renewal: Some(renewal),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Fires once ownership is known to be lost
    pub fn lost(&self) -> CancellationToken {
        self.lost.clone()
    }

    pub fn is_lost(&self) -> bool {
        self.lost.is_cancelled()
    }

    /// Check ownership before a mutating action.
    ///
    /// Returns `false` only when the lease is known to belong to someone
    /// else (or nobody); backend errors keep the benefit of the doubt.
    pub async fn verify(&self) -> bool {
        if self.lost.is_cancelled() {
            return false;
        }
        match self.lock.is_held_by(&self.topic_id, &self.owner).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(topic_id = %self.topic_id, owner = %self.owner, "topic lease lost");
                self.lost.cancel();
                false
            }
            Err(e) => {
                warn!(topic_id = %self.topic_id, error = %e, "lease check failed, continuing");
                true
            }
        }
    }

    /// Stop renewing and release the lease if still ours.
    pub async fn release(mut self) {
        self.stop.cancel();
        if let Some(renewal) = self.renewal.take() {
            let _ = renewal.await;
        }
        match self.lock.release(&self.topic_id, &self.owner).await {
            Ok(()) => info!(topic_id = %self.topic_id, owner = %self.owner, "topic lease released"),
            Err(LockError::NotHeld(_)) => {
                debug!(topic_id = %self.topic_id, "lease already gone at release")
            }
            Err(e) => warn!(topic_id = %self.topic_id, error = %e, "failed to release topic lease"),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

async fn renew_loop(
    lock: Arc<dyn TopicLock>,
    topic_id: String,
    owner: String,
    ttl: Duration,
    lost: CancellationToken,
    stop: CancellationToken,
) {
    let period = (ttl / 3).max(Duration::from_millis(1));
    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(period) => {}
        }

        match lock.renew(&topic_id, &owner, ttl).await {
            Ok(()) => debug!(topic_id = %topic_id, "topic lease renewed"),
            Err(LockError::Backend(e)) => {
                warn!(topic_id = %topic_id, error = %e, "lease renewal failed, retrying");
            }
            Err(e) => {
                warn!(topic_id = %topic_id, error = %e, "topic lease lost");
                lost.cancel();
                return;
            }
        }
    }
}
