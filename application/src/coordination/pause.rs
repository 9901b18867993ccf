//! Cross-replica pause signalling.
//!
//! A pause request may land on any replica, but only the replica holding a
//! topic's lease runs its turn loop. Requests are therefore published to the
//! pause stream as a marker keyed by topic id; every replica consumes that
//! stream and forwards markers for topics it has a local listener for.

use crate::ports::broker::{BrokerError, MessageBroker};
use seminar_domain::StateSignal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

struct Registration {
    id: u64,
    tx: mpsc::Sender<StateSignal>,
}

pub struct PauseCoordinator {
    broker: Arc<dyn MessageBroker>,
    stream: String,
    listeners: Mutex<HashMap<String, Registration>>,
    next_id: AtomicU64,
}

impl PauseCoordinator {
    pub fn new(broker: Arc<dyn MessageBroker>, stream: impl Into<String>) -> Self {
        Self {
            broker,
            stream: stream.into(),
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register the local signal channel for `topic_id`, replacing any
    /// previous one. The registration lives as long as the returned listener.
    pub fn register(self: &Arc<Self>, topic_id: &str) -> PauseListener {
        let (tx, rx) = mpsc::channel(1);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.insert(topic_id.to_string(), Registration { id, tx });
        }
        debug!(topic_id, "pause listener registered");
        PauseListener {
            topic_id: topic_id.to_string(),
            id,
            rx,
            coordinator: Arc::clone(self),
        }
    }

    fn deregister(&self, topic_id: &str, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if listeners.get(topic_id).is_some_and(|r| r.id == id) {
            listeners.remove(topic_id);
            debug!(topic_id, "pause listener deregistered");
        }
    }

    pub fn is_registered(&self, topic_id: &str) -> bool {
        self.listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(topic_id)
    }

    /// Deliver `Pause` to the local listener of `topic_id`, if any.
    ///
    /// Returns whether a signal was enqueued. An unregistered topic is a
    /// no-op; a pause already pending is not doubled.
    pub fn deliver_local(&self, topic_id: &str) -> bool {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        let Some(registration) = listeners.get(topic_id) else {
            return false;
        };
        match registration.tx.try_send(StateSignal::Pause) {
            Ok(()) => {
                info!(topic_id, "pause delivered");
                true
            }
            Err(TrySendError::Full(_)) => {
                debug!(topic_id, "pause already pending");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Publish a pause marker for `topic_id` to every replica.
    pub async fn request_pause(&self, topic_id: &str) -> Result<(), BrokerError> {
        self.broker
            .publish(&self.stream, topic_id, vec![topic_id.as_bytes().to_vec()])
            .await
    }

    /// Consume one partition of the pause stream until cancelled.
    pub async fn run_consumer(
        self: Arc<Self>,
        group: String,
        partition: usize,
        cancel: CancellationToken,
    ) -> Result<(), BrokerError> {
        let mut reader = self.broker.subscribe(&self.stream, &group, partition).await?;
        info!(stream = %self.stream, group = %group, partition, "pause consumer started");

        loop {
            match reader.read(&cancel).await {
                Ok(record) => {
                    debug!(topic_id = %record.key, partition, "pause marker received");
                    self.deliver_local(&record.key);
                }
                Err(BrokerError::Cancelled) => return Ok(()),
                Err(e) if e.is_terminal() => {
                    warn!(partition, error = %e, "pause consumer stopping");
                    return Err(e);
                }
                Err(e) => {
                    warn!(partition, error = %e, "pause stream read failed");
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(READ_RETRY_DELAY) => {}
                    }
                }
            }
        }
    }
}

/// Receiving end of a topic's pause channel.
///
/// Dropping it deregisters the topic unless a newer registration replaced it.
pub struct PauseListener {
    topic_id: String,
    id: u64,
    rx: mpsc::Receiver<StateSignal>,
    coordinator: Arc<PauseCoordinator>,
}

impl PauseListener {
    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    /// Wait for the next signal; `None` once replaced by a newer registration.
    pub async fn recv(&mut self) -> Option<StateSignal> {
        self.rx.recv().await
    }

    /// A signal that is already pending, if any
    pub fn try_recv(&mut self) -> Option<StateSignal> {
        self.rx.try_recv().ok()
    }
}

impl Drop for PauseListener {
    fn drop(&mut self) {
        self.coordinator.deregister(&self.topic_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockBroker;

    fn coordinator() -> (Arc<MockBroker>, Arc<PauseCoordinator>) {
        let broker = Arc::new(MockBroker::new());
        let coordinator = Arc::new(PauseCoordinator::new(broker.clone(), "pause"));
        (broker, coordinator)
    }

    #[tokio::test]
    async fn test_pause_without_listener_is_noop() {
        let (_, coordinator) = coordinator();
        assert!(!coordinator.deliver_local("t1"));
        assert!(!coordinator.is_registered("t1"));
    }

    #[tokio::test]
    async fn test_pause_delivers_exactly_one_signal() {
        let (_, coordinator) = coordinator();
        let mut listener = coordinator.register("t1");

        assert!(coordinator.deliver_local("t1"));
        assert!(!coordinator.deliver_local("t1"));

        assert_eq!(listener.recv().await, Some(StateSignal::Pause));
        assert_eq!(listener.try_recv(), None);
    }

    #[tokio::test]
    async fn test_drop_deregisters_only_own_registration() {
        let (_, coordinator) = coordinator();
        let old = coordinator.register("t1");
        let _new = coordinator.register("t1");

        drop(old);
        assert!(coordinator.is_registered("t1"));
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let (_, coordinator) = coordinator();
        let listener = coordinator.register("t1");
        drop(listener);
        assert!(!coordinator.is_registered("t1"));
    }

    #[tokio::test]
    async fn test_request_publishes_marker_keyed_by_topic() {
        let (broker, coordinator) = coordinator();
        coordinator.request_pause("t1").await.unwrap();

        let published = broker.published("pause");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "t1");
        assert_eq!(published[0].1, b"t1".to_vec());
    }

    #[tokio::test]
    async fn test_marker_reaches_listener_through_consumer() {
        let (_, coordinator) = coordinator();
        let cancel = CancellationToken::new();
        let consumer = tokio::spawn(Arc::clone(&coordinator).run_consumer(
            "g".to_string(),
            0,
            cancel.clone(),
        ));
        // Let the consumer subscribe at the current end of the stream
        tokio::task::yield_now().await;
        let mut listener = coordinator.register("t1");
        coordinator.request_pause("other").await.unwrap();
        coordinator.request_pause("t1").await.unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(1), listener.recv()).await;
        assert_eq!(signal.unwrap(), Some(StateSignal::Pause));

        cancel.cancel();
        assert_eq!(consumer.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_closed_broker_stops_consumer() {
        let (broker, coordinator) = coordinator();
        let consumer = tokio::spawn(Arc::clone(&coordinator).run_consumer(
            "g".to_string(),
            0,
            CancellationToken::new(),
        ));

        broker.close();
        let result = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(BrokerError::Closed));
        assert!(matches!(
            coordinator.request_pause("t1").await,
            Err(BrokerError::Closed)
        ));
    }
}
