//! Broker plumbing for the broadcast stream.
//!
//! [`BrokerBatchSender`] publishes token batches keyed by topic id;
//! [`run_consumer`] reads one partition back and feeds the local
//! [`BroadcastHub`].

use super::hub::BroadcastHub;
use crate::ports::broker::{BrokerError, MessageBroker};
use crate::streaming::BatchSender;
use async_trait::async_trait;
use seminar_domain::TokenMessage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Publishes token batches to the broadcast stream.
pub struct BrokerBatchSender {
    broker: Arc<dyn MessageBroker>,
    stream: String,
}

impl BrokerBatchSender {
    pub fn new(broker: Arc<dyn MessageBroker>, stream: impl Into<String>) -> Self {
        Self {
            broker,
            stream: stream.into(),
        }
    }

    /// Publish messages of one topic, in order.
    pub async fn publish(&self, topic_id: &str, messages: &[TokenMessage]) -> Result<(), BrokerError> {
        let payloads = messages
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BrokerError::Publish(e.to_string()))?;
        self.broker.publish(&self.stream, topic_id, payloads).await
    }
}

#[async_trait]
impl BatchSender for BrokerBatchSender {
    async fn send_batch(&self, batch: Vec<TokenMessage>) {
        // Keep per-topic order while splitting a mixed batch into one
        // publish per consecutive run of the same topic
        let mut start = 0;
        while start < batch.len() {
            let topic_id = &batch[start].topic_id;
            let end = batch[start..]
                .iter()
                .position(|m| &m.topic_id != topic_id)
                .map_or(batch.len(), |offset| start + offset);

            if let Err(e) = self.publish(topic_id, &batch[start..end]).await {
                error!(topic_id = %topic_id, error = %e, size = end - start, "failed to publish token batch");
            }
            start = end;
        }
    }
}

/// Consume one partition of the broadcast stream until cancelled.
///
/// Malformed records and transient read errors are logged and skipped.
/// Any other terminal broker error, such as [`BrokerError::Closed`], is
/// returned; restart policy belongs to the caller.
pub async fn run_consumer(
    broker: Arc<dyn MessageBroker>,
    hub: Arc<BroadcastHub>,
    stream: String,
    group: String,
    partition: usize,
    cancel: CancellationToken,
) -> Result<(), BrokerError> {
    let mut reader = broker.subscribe(&stream, &group, partition).await?;
    info!(stream = %stream, group = %group, partition, "broadcast consumer started");

    loop {
        let record = match reader.read(&cancel).await {
            Ok(record) => record,
            Err(BrokerError::Cancelled) => {
                debug!(partition, "broadcast consumer cancelled");
                return Ok(());
            }
            Err(e) if e.is_terminal() => {
                warn!(partition, error = %e, "broadcast consumer stopping");
                return Err(e);
            }
            Err(e) => {
                warn!(partition, error = %e, "broker read failed");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(READ_RETRY_DELAY) => continue,
                }
            }
        };

        let message: TokenMessage = match serde_json::from_slice(&record.value) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    partition,
                    offset = record.offset,
                    key = %record.key,
                    error = %e,
                    "skipping malformed token message"
                );
                continue;
            }
        };

        hub.ingest(message, &cancel).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockBroker;
    use seminar_domain::{ContentType, ModelSelector, Role};

    fn token(content: &str, position: u64) -> TokenMessage {
        let role = Role::participant("a", "Alice", ModelSelector::new("m"));
        TokenMessage::new("t1", &role, ContentType::Text, content, position)
    }

    fn consumer(
        broker: &Arc<MockBroker>,
        hub: &Arc<BroadcastHub>,
        cancel: &CancellationToken,
    ) -> tokio::task::JoinHandle<Result<(), BrokerError>> {
        tokio::spawn(run_consumer(
            Arc::clone(broker) as Arc<dyn MessageBroker>,
            Arc::clone(hub),
            "tokens".to_string(),
            "g".to_string(),
            0,
            cancel.clone(),
        ))
    }

    #[tokio::test]
    async fn test_published_batch_reaches_viewer_and_skips_garbage() {
        let broker = Arc::new(MockBroker::new());
        let hub = Arc::new(BroadcastHub::new(16, Duration::from_millis(50), 8));
        let cancel = CancellationToken::new();
        let mut viewer = hub.subscribe("t1");
        let handle = consumer(&broker, &hub, &cancel);

        broker
            .publish("tokens", "t1", vec![b"not json".to_vec()])
            .await
            .unwrap();
        let sender = BrokerBatchSender::new(broker.clone(), "tokens");
        sender.send_batch(vec![token("Hel", 0), token("lo", 1)]).await;

        for expected in ["Hel", "lo"] {
            let message = tokio::time::timeout(Duration::from_secs(1), viewer.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(message.content, expected);
        }

        cancel.cancel();
        assert_eq!(handle.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_closed_broker_stops_consumer() {
        let broker = Arc::new(MockBroker::new());
        let hub = Arc::new(BroadcastHub::new(16, Duration::from_millis(50), 8));
        let cancel = CancellationToken::new();
        let handle = consumer(&broker, &hub, &cancel);

        broker.close();
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(BrokerError::Closed));
        assert!(!cancel.is_cancelled());
    }
}
