//! Per-topic viewer registry with a catch-up cache.
//!
//! Every process runs one [`BroadcastHub`]. Broker consumers feed it with
//! [`BroadcastHub::ingest`]; viewers attach with
//! [`BroadcastHub::subscribe`].
//!
//! # Catch-up
//!
//! `subscribe` copies the topic's cache and registers the new connection
//! under the same lock that `ingest` takes to append to the cache and
//! snapshot the connection list. A message is therefore either in the copy
//! (ingested before registration) or delivered through the channel
//! (ingested after), never both and never neither.
//!
//! # Removal
//!
//! Unsubscribing only flags the connection closed. Delivery skips closed
//! connections, and flagged entries are pruned when the topic's cache
//! resets at the next turn.
//!
//! A topic's entry is dropped once it is idle: no live connection and no
//! turn in progress (an empty cache, or one closed by an `end` marker).
//! Entries are only created or dropped while the registry lock is held,
//! together with the topic's own lock, so a viewer can never attach to an
//! entry that has already been dropped.

use seminar_domain::TokenMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// One viewer's delivery endpoint.
pub struct ViewerConnection {
    id: String,
    tx: mpsc::Sender<TokenMessage>,
    closed: AtomicBool,
}

impl ViewerConnection {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[derive(Default)]
struct TopicData {
    connections: Vec<Arc<ViewerConnection>>,
    cache: VecDeque<TokenMessage>,
}

impl TopicData {
    /// Append to the cache, starting over when a new turn (or a new run)
    /// begins.
    fn cache_message(&mut self, message: &TokenMessage, capacity: usize) {
        let stale = self
            .cache
            .back()
            .is_some_and(|last| last.is_end() || last.role_id != message.role_id);
        if stale {
            self.cache.clear();
            self.connections.retain(|c| !c.is_closed());
        }
        if capacity == 0 {
            return;
        }
        while self.cache.len() >= capacity {
            self.cache.pop_front();
        }
        self.cache.push_back(message.clone());
    }

    fn live_connections(&self) -> usize {
        self.connections.iter().filter(|c| !c.is_closed()).count()
    }

    fn is_idle(&self) -> bool {
        self.live_connections() == 0 && self.cache.back().is_none_or(|last| last.is_end())
    }
}

/// Outcome of fanning one message out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    /// Deliveries abandoned after the delivery timeout
    pub backpressured: usize,
    /// Connections found dropped during delivery
    pub disconnected: usize,
    /// Fan-out stopped early because the delivery context was cancelled
    pub aborted: bool,
}

/// Process-local broadcast state for all topics.
pub struct BroadcastHub {
    topics: Mutex<HashMap<String, Arc<Mutex<TopicData>>>>,
    cache_capacity: usize,
    delivery_timeout: Duration,
    channel_capacity: usize,
}

impl BroadcastHub {
    pub fn new(cache_capacity: usize, delivery_timeout: Duration, channel_capacity: usize) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            cache_capacity,
            delivery_timeout,
            channel_capacity: channel_capacity.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Arc<Mutex<TopicData>>>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn existing(&self, topic_id: &str) -> Option<Arc<Mutex<TopicData>>> {
        self.registry().get(topic_id).cloned()
    }

    /// Topics currently holding viewers or a cached turn
    pub fn topic_count(&self) -> usize {
        self.registry().len()
    }

    /// Attach a new viewer to `topic_id`.
    ///
    /// The returned subscription first yields the cached messages of the
    /// in-progress turn, then live messages.
    pub fn subscribe(self: &Arc<Self>, topic_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let connection = Arc::new(ViewerConnection {
            id: uuid::Uuid::new_v4().to_string(),
            tx,
            closed: AtomicBool::new(false),
        });

        let backlog = {
            let mut topics = self.registry();
            let mut data = topics
                .entry(topic_id.to_string())
                .or_default()
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            let backlog = data.cache.clone();
            data.connections.push(Arc::clone(&connection));
            backlog
        };

        debug!(topic_id, viewer = %connection.id, cached = backlog.len(), "viewer subscribed");

        Subscription {
            topic_id: topic_id.to_string(),
            connection,
            backlog,
            rx,
            hub: Arc::clone(self),
        }
    }

    /// Register an externally created delivery channel. No catch-up replay.
    pub fn register(&self, topic_id: &str, tx: mpsc::Sender<TokenMessage>) -> String {
        let connection = Arc::new(ViewerConnection {
            id: uuid::Uuid::new_v4().to_string(),
            tx,
            closed: AtomicBool::new(false),
        });
        let id = connection.id.clone();
        self.registry()
            .entry(topic_id.to_string())
            .or_default()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .connections
            .push(connection);
        id
    }

    /// Flag a connection closed. Unknown ids are ignored.
    pub fn unsubscribe(&self, topic_id: &str, connection_id: &str) {
        let mut topics = self.registry();
        let Some(entry) = topics.get(topic_id).cloned() else {
            return;
        };
        let data = entry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(connection) = data.connections.iter().find(|c| c.id == connection_id) {
            connection.close();
            debug!(topic_id, viewer = connection_id, "viewer unsubscribed");
        }
        if data.is_idle() {
            topics.remove(topic_id);
            debug!(topic_id, "idle topic dropped from hub");
        }
    }

    /// Live (non-closed) connections of a topic
    pub fn connection_count(&self, topic_id: &str) -> usize {
        self.existing(topic_id).map_or(0, |data| {
            data.lock()
                .unwrap_or_else(|e| e.into_inner())
                .live_connections()
        })
    }

    /// Snapshot of a topic's catch-up cache
    pub fn cached(&self, topic_id: &str) -> Vec<TokenMessage> {
        self.existing(topic_id).map_or_else(Vec::new, |data| {
            let data = data.lock().unwrap_or_else(|e| e.into_inner());
            data.cache.iter().cloned().collect()
        })
    }

    /// Cache one message and deliver it to every live connection of its
    /// topic.
    ///
    /// A full viewer channel is waited on for at most the delivery timeout
    /// and then skipped. Cancellation aborts the remaining deliveries for
    /// this message. An `end` marker nobody is watching drops the topic's
    /// entry.
    pub async fn ingest(&self, message: TokenMessage, cancel: &CancellationToken) -> FanoutReport {
        let targets: Vec<Arc<ViewerConnection>> = {
            let mut topics = self.registry();
            let entry = Arc::clone(topics.entry(message.topic_id.clone()).or_default());
            let mut data = entry.lock().unwrap_or_else(|e| e.into_inner());
            data.cache_message(&message, self.cache_capacity);
            if message.is_end() && data.is_idle() {
                topics.remove(&message.topic_id);
                debug!(topic_id = %message.topic_id, "run ended with no viewers, topic dropped from hub");
                return FanoutReport::default();
            }
            data.connections
                .iter()
                .filter(|c| !c.is_closed())
                .cloned()
                .collect()
        };

        let mut report = FanoutReport::default();
        for connection in targets {
            if connection.is_closed() {
                continue;
            }
            let send = tokio::time::timeout(self.delivery_timeout, connection.tx.send(message.clone()));
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.aborted = true;
                    break;
                }
                result = send => match result {
                    Ok(Ok(())) => report.delivered += 1,
                    Ok(Err(_)) => {
                        connection.close();
                        report.disconnected += 1;
                    }
                    Err(_) => {
                        warn!(
                            topic_id = %message.topic_id,
                            viewer = %connection.id,
                            "viewer delivery timed out, message dropped for this viewer"
                        );
                        report.backpressured += 1;
                    }
                },
            }
        }

        trace!(topic_id = %message.topic_id, ?report, "message fanned out");
        report
    }
}

/// A viewer's attachment to a topic.
///
/// Dropping it flags the connection closed.
pub struct Subscription {
    topic_id: String,
    connection: Arc<ViewerConnection>,
    backlog: VecDeque<TokenMessage>,
    rx: mpsc::Receiver<TokenMessage>,
    hub: Arc<BroadcastHub>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.connection.id
    }

    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    /// Next message: cached ones first, then live ones. `None` after
    /// unsubscribing once the channel is drained.
    pub async fn recv(&mut self) -> Option<TokenMessage> {
        if let Some(message) = self.backlog.pop_front() {
            return Some(message);
        }
        if self.connection.is_closed() {
            return self.rx.try_recv().ok();
        }
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.topic_id, &self.connection.id);
    }
}
