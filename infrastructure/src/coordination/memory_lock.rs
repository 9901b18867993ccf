//! In-process topic lease with TTL.

use async_trait::async_trait;
use seminar_application::ports::topic_lock::{LockError, TopicLock};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

struct Lease {
    owner: String,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Lease table keyed by topic id. An expired lease counts as free.
#[derive(Default)]
pub struct InMemoryTopicLock {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryTopicLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TopicLock for InMemoryTopicLock {
    async fn acquire(&self, topic_id: &str, owner: &str, ttl: Duration) -> Result<(), LockError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lease) = leases.get(topic_id)
            && lease.is_live(now)
            && lease.owner != owner
        {
            return Err(LockError::Held {
                topic_id: topic_id.to_string(),
                holder: lease.owner.clone(),
            });
        }
        debug!(topic_id, owner, ttl_ms = ttl.as_millis() as u64, "lease granted");
        leases.insert(
            topic_id.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn renew(&self, topic_id: &str, owner: &str, ttl: Duration) -> Result<(), LockError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        match leases.get_mut(topic_id) {
            Some(lease) if lease.owner == owner && lease.is_live(now) => {
                lease.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(LockError::NotHeld(topic_id.to_string())),
        }
    }

    async fn release(&self, topic_id: &str, owner: &str) -> Result<(), LockError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        match leases.get(topic_id) {
            Some(lease) if lease.owner == owner => {
                let live = lease.is_live(now);
                leases.remove(topic_id);
                if live {
                    Ok(())
                } else {
                    Err(LockError::NotHeld(topic_id.to_string()))
                }
            }
            _ => Err(LockError::NotHeld(topic_id.to_string())),
        }
    }

    async fn holder(&self, topic_id: &str) -> Result<Option<String>, LockError> {
        let now = Instant::now();
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        Ok(leases
            .get(topic_id)
            .filter(|lease| lease.is_live(now))
            .map(|lease| lease.owner.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test(start_paused = true)]
    async fn test_exclusive_while_live() {
        let lock = InMemoryTopicLock::new();
        lock.acquire("t1", "a", TTL).await.unwrap();
        assert_eq!(
            lock.acquire("t1", "b", TTL).await,
            Err(LockError::Held {
                topic_id: "t1".into(),
                holder: "a".into()
            })
        );
        // Re-acquiring by the same owner refreshes
        lock.acquire("t1", "a", TTL).await.unwrap();
        assert!(lock.is_held_by("t1", "a").await.unwrap());
        // Other topics are unaffected
        lock.acquire("t2", "b", TTL).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_frees_the_topic() {
        let lock = InMemoryTopicLock::new();
        lock.acquire("t1", "a", TTL).await.unwrap();

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        assert_eq!(lock.holder("t1").await.unwrap(), None);
        assert_eq!(
            lock.renew("t1", "a", TTL).await,
            Err(LockError::NotHeld("t1".into()))
        );
        lock.acquire("t1", "b", TTL).await.unwrap();
        assert_eq!(lock.holder("t1").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_extends_lease() {
        let lock = InMemoryTopicLock::new();
        lock.acquire("t1", "a", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        lock.renew("t1", "a", TTL).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(lock.is_held_by("t1", "a").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_by_owner() {
        let lock = InMemoryTopicLock::new();
        lock.acquire("t1", "a", TTL).await.unwrap();
        assert_eq!(
            lock.release("t1", "b").await,
            Err(LockError::NotHeld("t1".into()))
        );
        assert!(lock.is_held_by("t1", "a").await.unwrap());

        lock.release("t1", "a").await.unwrap();
        assert_eq!(lock.holder("t1").await.unwrap(), None);
    }
}
