//! In-process partitioned log.
//!
//! Stands in for an external broker when every replica lives in the same
//! process: each stream has a fixed number of append-only partitions, a
//! record's partition is derived from its key, and each reader group keeps
//! its own committed offset per partition.

use async_trait::async_trait;
use seminar_application::ports::broker::{BrokerError, BrokerReader, BrokerRecord, MessageBroker};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

struct Entry {
    key: String,
    value: Vec<u8>,
}

type OffsetKey = (String, String, usize);

#[derive(Default)]
struct BrokerState {
    /// stream -> partitions -> records
    logs: Mutex<HashMap<String, Vec<Vec<Entry>>>>,
    /// (stream, group, partition) -> next offset to read
    offsets: Mutex<HashMap<OffsetKey, u64>>,
    appended: Notify,
    closed: AtomicBool,
}

pub struct InMemoryBroker {
    partitions: usize,
    state: Arc<BrokerState>,
}

impl InMemoryBroker {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: partitions.max(1),
            state: Arc::new(BrokerState::default()),
        }
    }

    /// Partition for `key`: FNV-1a, so the mapping is stable across runs
    pub fn partition_for(&self, key: &str) -> usize {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in key.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        (hash % self.partitions as u64) as usize
    }

    /// Number of records appended to one partition so far
    pub fn len(&self, stream: &str, partition: usize) -> usize {
        self.state
            .logs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(stream)
            .and_then(|partitions| partitions.get(partition))
            .map_or(0, Vec::len)
    }

    /// Readers attached under `group`, across all streams and partitions
    pub fn attached(&self, group: &str) -> usize {
        self.state
            .offsets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(_, g, _)| g == group)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    /// Shut down: pending and future reads fail with `Closed`.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.appended.notify_waiters();
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    fn partitions(&self) -> usize {
        self.partitions
    }

    async fn publish(
        &self,
        stream: &str,
        key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        let partition = self.partition_for(key);
        {
            let mut logs = self.state.logs.lock().unwrap_or_else(|e| e.into_inner());
            let partitions = logs
                .entry(stream.to_string())
                .or_insert_with(|| (0..self.partitions).map(|_| Vec::new()).collect());
            let log = &mut partitions[partition];
            let count = payloads.len();
            log.extend(payloads.into_iter().map(|value| Entry {
                key: key.to_string(),
                value,
            }));
            trace!(stream, key, partition, count, "records appended");
        }
        self.state.appended.notify_waiters();
        Ok(())
    }

    async fn subscribe(
        &self,
        stream: &str,
        group: &str,
        partition: usize,
    ) -> Result<Box<dyn BrokerReader>, BrokerError> {
        if partition >= self.partitions {
            return Err(BrokerError::Read(format!(
                "partition {} out of range (0..{})",
                partition, self.partitions
            )));
        }
        let key = (stream.to_string(), group.to_string(), partition);
        let end = self.len(stream, partition) as u64;
        let start = *self
            .state
            .offsets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_insert(end);
        debug!(stream, group, partition, offset = start, "reader attached");

        Ok(Box::new(InMemoryReader {
            state: Arc::clone(&self.state),
            key,
        }))
    }
}

struct InMemoryReader {
    state: Arc<BrokerState>,
    key: OffsetKey,
}

impl InMemoryReader {
    /// Take the record at the group's offset, committing past it
    fn take_next(&self) -> Option<BrokerRecord> {
        let logs = self.state.logs.lock().unwrap_or_else(|e| e.into_inner());
        let (stream, _, partition) = &self.key;
        let log = logs.get(stream)?.get(*partition)?;

        let mut offsets = self.state.offsets.lock().unwrap_or_else(|e| e.into_inner());
        let offset = offsets.entry(self.key.clone()).or_insert(0);
        let entry = log.get(*offset as usize)?;
        let record = BrokerRecord {
            key: entry.key.clone(),
            value: entry.value.clone(),
            partition: *partition,
            offset: *offset,
        };
        *offset += 1;
        Some(record)
    }
}

#[async_trait]
impl BrokerReader for InMemoryReader {
    async fn read(&mut self, cancel: &CancellationToken) -> Result<BrokerRecord, BrokerError> {
        loop {
            // Register interest before checking, so an append in between is not missed
            let appended = self.state.appended.notified();
            tokio::pin!(appended);
            appended.as_mut().enable();

            if self.state.closed.load(Ordering::SeqCst) {
                return Err(BrokerError::Closed);
            }
            if let Some(record) = self.take_next() {
                return Ok(record);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
                _ = &mut appended => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn read_value(reader: &mut Box<dyn BrokerReader>) -> String {
        let record = tokio::time::timeout(
            Duration::from_secs(1),
            reader.read(&CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();
        String::from_utf8(record.value).unwrap()
    }

    #[test]
    fn test_partition_is_a_function_of_key() {
        let broker = InMemoryBroker::new(4);
        let p = broker.partition_for("topic-1");
        assert_eq!(p, broker.partition_for("topic-1"));
        assert!(p < 4);
        assert_eq!(InMemoryBroker::new(0).partitions(), 1);
    }

    #[tokio::test]
    async fn test_per_key_order_and_batch_contiguity() {
        let broker = InMemoryBroker::new(4);
        let partition = broker.partition_for("t1");
        let mut reader = broker.subscribe("tokens", "g", partition).await.unwrap();

        broker
            .publish("tokens", "t1", vec![b"a".to_vec(), b"b".to_vec()])
            .await
            .unwrap();
        broker.publish("tokens", "t1", vec![b"c".to_vec()]).await.unwrap();

        assert_eq!(read_value(&mut reader).await, "a");
        assert_eq!(read_value(&mut reader).await, "b");
        assert_eq!(read_value(&mut reader).await, "c");
    }

    #[tokio::test]
    async fn test_new_group_starts_at_end() {
        let broker = InMemoryBroker::new(1);
        broker.publish("s", "k", vec![b"old".to_vec()]).await.unwrap();

        let mut reader = broker.subscribe("s", "late", 0).await.unwrap();
        broker.publish("s", "k", vec![b"new".to_vec()]).await.unwrap();
        assert_eq!(read_value(&mut reader).await, "new");
    }

    #[tokio::test]
    async fn test_groups_have_independent_offsets() {
        let broker = InMemoryBroker::new(1);
        let mut first = broker.subscribe("s", "g1", 0).await.unwrap();
        let mut second = broker.subscribe("s", "g2", 0).await.unwrap();
        broker
            .publish("s", "k", vec![b"x".to_vec(), b"y".to_vec()])
            .await
            .unwrap();

        assert_eq!(read_value(&mut first).await, "x");
        assert_eq!(read_value(&mut first).await, "y");
        assert_eq!(read_value(&mut second).await, "x");

        // A re-attached reader resumes at the group's committed offset
        drop(second);
        let mut again = broker.subscribe("s", "g2", 0).await.unwrap();
        assert_eq!(read_value(&mut again).await, "y");
    }

    #[tokio::test]
    async fn test_attached_counts_group_readers() {
        let broker = InMemoryBroker::new(2);
        assert_eq!(broker.attached("g"), 0);
        let _a = broker.subscribe("tokens", "g", 0).await.unwrap();
        let _b = broker.subscribe("pause", "g", 1).await.unwrap();
        let _c = broker.subscribe("tokens", "other", 0).await.unwrap();
        assert_eq!(broker.attached("g"), 2);
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let broker = InMemoryBroker::new(1);
        let mut pause = broker.subscribe("pause", "g", 0).await.unwrap();
        broker.publish("tokens", "k", vec![b"tok".to_vec()]).await.unwrap();
        broker.publish("pause", "k", vec![b"stop".to_vec()]).await.unwrap();
        assert_eq!(read_value(&mut pause).await, "stop");
    }

    #[tokio::test]
    async fn test_blocked_read_wakes_on_publish() {
        let broker = Arc::new(InMemoryBroker::new(1));
        let mut reader = broker.subscribe("s", "g", 0).await.unwrap();
        let publisher = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish("s", "k", vec![b"late".to_vec()]).await.unwrap();
        });
        assert_eq!(read_value(&mut reader).await, "late");
    }

    #[tokio::test]
    async fn test_cancel_and_close() {
        let broker = InMemoryBroker::new(1);
        let mut reader = broker.subscribe("s", "g", 0).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(reader.read(&cancel).await, Err(BrokerError::Cancelled));

        broker.close();
        assert_eq!(
            reader.read(&CancellationToken::new()).await,
            Err(BrokerError::Closed)
        );
        assert_eq!(
            broker.publish("s", "k", vec![]).await,
            Err(BrokerError::Closed)
        );
    }

    #[tokio::test]
    async fn test_out_of_range_partition() {
        let broker = InMemoryBroker::new(2);
        assert!(broker.subscribe("s", "g", 2).await.is_err());
    }
}
