//! Scripted and recording port implementations shared by unit tests.

use crate::ports::broker::{BrokerError, BrokerReader, BrokerRecord, MessageBroker};
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::designation::DesignationExtractor;
use crate::ports::llm_gateway::{ChatModel, GatewayError, LlmGateway, StreamHandle};
use crate::ports::repository::{RepositoryError, SeminarRepository};
use crate::ports::tool_executor::{ToolError, ToolExecutorPort};
use crate::ports::topic_lock::{LockError, TopicLock};
use crate::streaming::BatchSender;
use async_trait::async_trait;
use seminar_domain::{
    Message, ModelSelector, Role, Speech, StreamEvent, TokenMessage, ToolCall, ToolDescriptor,
    Topic, TopicState,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

// ==================== Broker ====================

struct LogEntry {
    stream: String,
    key: String,
    value: Vec<u8>,
}

#[derive(Default)]
struct BrokerState {
    log: Mutex<Vec<LogEntry>>,
    notify: Notify,
    closed: AtomicBool,
}

/// Single-partition broker; every reader starts at the beginning of its stream.
#[derive(Default)]
pub struct MockBroker {
    state: Arc<BrokerState>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self, stream: &str) -> Vec<(String, Vec<u8>)> {
        self.state
            .log
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.stream == stream)
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    pub fn published_tokens(&self, stream: &str) -> Vec<TokenMessage> {
        self.published(stream)
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).unwrap())
            .collect()
    }

    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }
}

#[async_trait]
impl MessageBroker for MockBroker {
    fn partitions(&self) -> usize {
        1
    }

    async fn publish(
        &self,
        stream: &str,
        key: &str,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), BrokerError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }
        {
            let mut log = self.state.log.lock().unwrap();
            for value in payloads {
                log.push(LogEntry {
                    stream: stream.to_string(),
                    key: key.to_string(),
                    value,
                });
            }
        }
        self.state.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(
        &self,
        stream: &str,
        _group: &str,
        _partition: usize,
    ) -> Result<Box<dyn BrokerReader>, BrokerError> {
        Ok(Box::new(MockReader {
            state: Arc::clone(&self.state),
            stream: stream.to_string(),
            index: 0,
        }))
    }
}

struct MockReader {
    state: Arc<BrokerState>,
    stream: String,
    index: usize,
}

impl MockReader {
    fn next_record(&mut self) -> Option<BrokerRecord> {
        let log = self.state.log.lock().unwrap();
        while self.index < log.len() {
            let entry = &log[self.index];
            self.index += 1;
            if entry.stream == self.stream {
                return Some(BrokerRecord {
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    partition: 0,
                    offset: (self.index - 1) as u64,
                });
            }
        }
        None
    }
}

#[async_trait]
impl BrokerReader for MockReader {
    async fn read(&mut self, cancel: &CancellationToken) -> Result<BrokerRecord, BrokerError> {
        let state = Arc::clone(&self.state);
        loop {
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(record) = self.next_record() {
                return Ok(record);
            }
            if state.closed.load(Ordering::SeqCst) {
                return Err(BrokerError::Closed);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(BrokerError::Cancelled),
                _ = &mut notified => {}
            }
        }
    }
}

// ==================== Lock ====================

#[derive(Default)]
pub struct MockLock {
    holders: Mutex<HashMap<String, String>>,
    renewals: AtomicUsize,
    backend_down: AtomicBool,
}

impl MockLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renewals(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    pub fn steal(&self, topic_id: &str, owner: &str) {
        self.holders
            .lock()
            .unwrap()
            .insert(topic_id.to_string(), owner.to_string());
    }

    pub fn fail_backend(&self, down: bool) {
        self.backend_down.store(down, Ordering::SeqCst);
    }

    fn check_backend(&self) -> Result<(), LockError> {
        if self.backend_down.load(Ordering::SeqCst) {
            return Err(LockError::Backend("unreachable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TopicLock for MockLock {
    async fn acquire(&self, topic_id: &str, owner: &str, _ttl: Duration) -> Result<(), LockError> {
        self.check_backend()?;
        let mut holders = self.holders.lock().unwrap();
        match holders.get(topic_id) {
            Some(holder) if holder != owner => Err(LockError::Held {
                topic_id: topic_id.to_string(),
                holder: holder.clone(),
            }),
            _ => {
                holders.insert(topic_id.to_string(), owner.to_string());
                Ok(())
            }
        }
    }

    async fn renew(&self, topic_id: &str, owner: &str, _ttl: Duration) -> Result<(), LockError> {
        self.check_backend()?;
        self.renewals.fetch_add(1, Ordering::SeqCst);
        match self.holders.lock().unwrap().get(topic_id) {
            Some(holder) if holder == owner => Ok(()),
            _ => Err(LockError::NotHeld(topic_id.to_string())),
        }
    }

    async fn release(&self, topic_id: &str, owner: &str) -> Result<(), LockError> {
        self.check_backend()?;
        let mut holders = self.holders.lock().unwrap();
        match holders.get(topic_id) {
            Some(holder) if holder == owner => {
                holders.remove(topic_id);
                Ok(())
            }
            _ => Err(LockError::NotHeld(topic_id.to_string())),
        }
    }

    async fn holder(&self, topic_id: &str) -> Result<Option<String>, LockError> {
        self.check_backend()?;
        Ok(self.holders.lock().unwrap().get(topic_id).cloned())
    }
}

// ==================== Batches ====================

#[derive(Default)]
pub struct RecordingSender {
    batches: Mutex<Vec<Vec<TokenMessage>>>,
}

impl RecordingSender {
    pub fn messages(&self) -> Vec<TokenMessage> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl BatchSender for RecordingSender {
    async fn send_batch(&self, batch: Vec<TokenMessage>) {
        self.batches.lock().unwrap().push(batch);
    }
}

// ==================== Tools ====================

pub struct RecordingTools {
    names: Vec<String>,
    fail: bool,
    invoked: Mutex<Vec<String>>,
}

impl RecordingTools {
    pub fn new(names: Vec<&str>) -> Self {
        Self {
            names: names.into_iter().map(String::from).collect(),
            fail: false,
            invoked: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutorPort for RecordingTools {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.names
            .iter()
            .map(|n| ToolDescriptor::new(n.clone(), "test tool"))
            .collect()
    }

    async fn invoke(&self, call: &ToolCall) -> Result<String, ToolError> {
        self.invoked.lock().unwrap().push(call.name.clone());
        if self.fail {
            return Err(ToolError::ExecutionFailed("exploded".into()));
        }
        Ok(format!("result of {}", call.name))
    }
}

// ==================== Chat models ====================

#[derive(Clone)]
pub struct ScriptedReply {
    events: Vec<StreamEvent>,
    hang: bool,
}

impl ScriptedReply {
    pub fn events(events: Vec<StreamEvent>) -> Self {
        Self {
            events,
            hang: false,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::events(vec![StreamEvent::Delta(text.to_string()), StreamEvent::Completed])
    }

    /// Emit `events`, then stall until cancelled
    pub fn hanging(events: Vec<StreamEvent>) -> Self {
        Self { events, hang: true }
    }
}

pub struct ModelRequest {
    pub messages: Vec<Message>,
    pub tool_count: usize,
}

pub struct ScriptedModel {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| ModelRequest {
                messages: r.messages.clone(),
                tool_count: r.tool_count,
            })
            .collect()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        cancel: CancellationToken,
    ) -> Result<StreamHandle, GatewayError> {
        self.requests.lock().unwrap().push(ModelRequest {
            messages: messages.to_vec(),
            tool_count: tools.len(),
        });
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::text("(no more responses)"));

        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in reply.events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if reply.hang {
                cancel.cancelled().await;
            }
        });
        Ok(StreamHandle::new(rx))
    }
}

/// Gateway handing out one scripted model per model name
#[derive(Default)]
pub struct ScriptedGateway {
    models: HashMap<String, Arc<ScriptedModel>>,
}

impl ScriptedGateway {
    pub fn with_model(mut self, name: &str, model: Arc<ScriptedModel>) -> Self {
        self.models.insert(name.to_string(), model);
        self
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn chat_model(&self, selector: &ModelSelector) -> Result<Arc<dyn ChatModel>, GatewayError> {
        self.models
            .get(&selector.model)
            .map(|m| Arc::clone(m) as Arc<dyn ChatModel>)
            .ok_or_else(|| GatewayError::ModelNotAvailable(selector.model.clone()))
    }
}

#[derive(Default)]
pub struct ScriptedExtractor {
    answers: Mutex<VecDeque<Result<String, GatewayError>>>,
    inputs: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new(answers: Vec<Result<&str, GatewayError>>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(|a| a.map(String::from)).collect()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl DesignationExtractor for ScriptedExtractor {
    async fn extract(&self, moderator_text: &str) -> Result<String, GatewayError> {
        self.inputs.lock().unwrap().push(moderator_text.to_string());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

// ==================== Repository ====================

#[derive(Default)]
pub struct MemoryRepository {
    topics: Mutex<HashMap<String, Topic>>,
    roles: Mutex<HashMap<String, Role>>,
    saved: Mutex<Vec<Speech>>,
    states: Mutex<Vec<(String, TopicState)>>,
}

impl MemoryRepository {
    pub fn with_topic(self, topic: Topic) -> Self {
        self.topics.lock().unwrap().insert(topic.id.clone(), topic);
        self
    }

    pub fn with_role(self, role: Role) -> Self {
        self.roles.lock().unwrap().insert(role.id.clone(), role);
        self
    }

    pub fn saved(&self) -> Vec<Speech> {
        self.saved.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<(String, TopicState)> {
        self.states.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeminarRepository for MemoryRepository {
    async fn get_topic(&self, topic_id: &str) -> Result<Option<Topic>, RepositoryError> {
        Ok(self.topics.lock().unwrap().get(topic_id).cloned())
    }

    async fn save_speech(&self, speech: &Speech) -> Result<(), RepositoryError> {
        self.saved.lock().unwrap().push(speech.clone());
        if let Some(topic) = self.topics.lock().unwrap().get_mut(&speech.topic_id) {
            topic.append_speech(speech.clone());
        }
        Ok(())
    }

    async fn save_topic_state(
        &self,
        topic_id: &str,
        state: TopicState,
    ) -> Result<(), RepositoryError> {
        self.states.lock().unwrap().push((topic_id.to_string(), state));
        if let Some(topic) = self.topics.lock().unwrap().get_mut(topic_id) {
            topic.state = state;
        }
        Ok(())
    }

    async fn get_roles(&self, role_ids: &[String]) -> Result<Vec<Role>, RepositoryError> {
        let roles = self.roles.lock().unwrap();
        role_ids
            .iter()
            .map(|id| {
                roles
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RepositoryError::NotFound(id.clone()))
            })
            .collect()
    }
}

// ==================== Logger ====================

#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingLogger {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl ConversationLogger for RecordingLogger {
    fn log(&self, event: ConversationEvent) {
        self.events.lock().unwrap().push(event.event_type);
    }
}
