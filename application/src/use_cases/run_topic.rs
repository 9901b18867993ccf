//! Run Topic use case
//!
//! [`SeminarService`] drives a topic's turn loop and exposes the viewer
//! surface. One `run_topic` call:
//!
//! 1. takes the topic lease (another live holder aborts with `TopicLocked`),
//! 2. loads the topic and moves it to `Running`,
//! 3. rebuilds the scheduler and the `@name:content` history from the
//!    speeches saved so far,
//! 4. alternates turns until a pause signal, the turn bound or an error,
//! 5. publishes an `end` marker, records `Paused` if the run parked itself,
//!    and releases the lease.
//!
//! Within a turn, a completed response is only persisted after the next
//! speaker has been resolved and lease ownership re-verified, so the stored
//! history never ends in a turn the run could not continue from.

use super::execute_turn::{ExecuteTurnUseCase, TurnInput, TurnOutcome};
use crate::broadcast::{BroadcastHub, BrokerBatchSender, Subscription, run_consumer};
use crate::config::SeminarParams;
use crate::coordination::{LeaseGuard, PauseCoordinator, PauseListener};
use crate::ports::broker::{BrokerError, MessageBroker};
use crate::ports::conversation_logger::{
    ConversationEvent, ConversationLogger, NoConversationLogger,
};
use crate::ports::designation::DesignationExtractor;
use crate::ports::llm_gateway::{GatewayError, LlmGateway};
use crate::ports::repository::{RepositoryError, SeminarRepository};
use crate::ports::retrieval::{DocumentRetriever, NoRetrieval};
use crate::ports::tool_executor::{NoTools, ToolExecutorPort};
use crate::ports::topic_lock::{LockError, TopicLock};
use crate::streaming::{BatchSender, TokenBuffer};
use seminar_domain::{
    DomainError, Message, RoleScheduler, SeminarPrompt, Speech, StateSignal, TokenMessage, Topic,
    TopicState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Errors that can abort a run
#[derive(Error, Debug)]
pub enum RunTopicError {
    #[error("Topic not found: {0}")]
    TopicNotFound(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Next-speaker extraction failed: {0}")]
    ExtractionFailed(GatewayError),

    #[error("Model stream failed: {0}")]
    StreamError(GatewayError),

    #[error("Topic {topic_id} is already running")]
    TopicLocked {
        topic_id: String,
        holder: Option<String>,
    },

    #[error("Lost the lease on topic {0}")]
    LeaseLost(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),
}

impl RunTopicError {
    /// The moderator designated someone who is not a participant
    pub fn is_unknown_role(&self) -> bool {
        matches!(self, RunTopicError::Domain(e) if e.is_unknown_role())
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, RunTopicError::TopicLocked { .. })
    }
}

/// Why a run stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A pause signal arrived
    Paused,
    /// The per-run turn bound was reached
    TurnLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Speeches saved during this run
    pub turns: usize,
}

enum LoopExit {
    Paused,
    TurnLimit,
    Failed(RunTopicError),
}

/// Per-run counters the turn loop leaves behind for the end marker
struct TurnCursor<'a> {
    /// Ordering counter for streamed fragments
    position: &'a mut u64,
    /// Role id of the latest turn to start
    speaker: &'a mut Option<String>,
}

/// The orchestration service: topic runs plus the viewer surface.
pub struct SeminarService {
    gateway: Arc<dyn LlmGateway>,
    extractor: Arc<dyn DesignationExtractor>,
    repository: Arc<dyn SeminarRepository>,
    retriever: Arc<dyn DocumentRetriever>,
    tools: Arc<dyn ToolExecutorPort>,
    lock: Arc<dyn TopicLock>,
    broker: Arc<dyn MessageBroker>,
    conversation_logger: Arc<dyn ConversationLogger>,
    hub: Arc<BroadcastHub>,
    pause: Arc<PauseCoordinator>,
    publisher: Arc<BrokerBatchSender>,
    params: SeminarParams,
    replica_id: String,
    working_set: Mutex<HashMap<String, Topic>>,
}

impl SeminarService {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        extractor: Arc<dyn DesignationExtractor>,
        repository: Arc<dyn SeminarRepository>,
        lock: Arc<dyn TopicLock>,
        broker: Arc<dyn MessageBroker>,
        params: SeminarParams,
    ) -> Self {
        let hub = Arc::new(BroadcastHub::new(
            params.streaming.cache_capacity,
            params.streaming.delivery_timeout,
            params.streaming.viewer_channel_capacity,
        ));
        let pause = Arc::new(PauseCoordinator::new(
            Arc::clone(&broker),
            params.broker.pause_stream.clone(),
        ));
        let publisher = Arc::new(BrokerBatchSender::new(
            Arc::clone(&broker),
            params.broker.token_stream.clone(),
        ));

        Self {
            gateway,
            extractor,
            repository,
            retriever: Arc::new(NoRetrieval),
            tools: Arc::new(NoTools),
            lock,
            broker,
            conversation_logger: Arc::new(NoConversationLogger),
            hub,
            pause,
            publisher,
            params,
            replica_id: uuid::Uuid::new_v4().to_string(),
            working_set: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn DocumentRetriever>) -> Self {
        self.retriever = retriever;
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolExecutorPort>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    pub fn with_replica_id(mut self, replica_id: impl Into<String>) -> Self {
        self.replica_id = replica_id.into();
        self
    }

    pub fn replica_id(&self) -> &str {
        &self.replica_id
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn pause_coordinator(&self) -> &Arc<PauseCoordinator> {
        &self.pause
    }

    /// Spawn one broadcast consumer and one pause consumer per broker
    /// partition, reading under this replica's own group.
    pub fn spawn_consumers(
        &self,
        cancel: CancellationToken,
    ) -> Vec<JoinHandle<Result<(), BrokerError>>> {
        let group = self.params.broker.group_for(&self.replica_id);
        let mut handles = Vec::new();
        for partition in 0..self.broker.partitions() {
            handles.push(tokio::spawn(run_consumer(
                Arc::clone(&self.broker),
                Arc::clone(&self.hub),
                self.params.broker.token_stream.clone(),
                group.clone(),
                partition,
                cancel.clone(),
            )));
            handles.push(tokio::spawn(Arc::clone(&self.pause).run_consumer(
                group.clone(),
                partition,
                cancel.clone(),
            )));
        }
        handles
    }

    // ==================== Viewer surface ====================

    /// Attach a viewer; it first receives the in-progress turn so far.
    pub fn subscribe(&self, topic_id: &str) -> Subscription {
        self.hub.subscribe(topic_id)
    }

    pub fn unsubscribe(&self, topic_id: &str, connection_id: &str) {
        self.hub.unsubscribe(topic_id, connection_id);
    }

    /// Topic with its speeches, from the working set or persistence.
    pub async fn topic(&self, topic_id: &str) -> Result<Topic, RunTopicError> {
        if let Some(topic) = self.cached_topic(topic_id) {
            return Ok(topic);
        }
        self.repository
            .get_topic(topic_id)
            .await?
            .ok_or_else(|| RunTopicError::TopicNotFound(topic_id.to_string()))
    }

    /// Whether any process currently holds the topic's lease
    pub async fn is_topic_running(&self, topic_id: &str) -> Result<bool, RunTopicError> {
        Ok(self.lock.holder(topic_id).await?.is_some())
    }

    /// Ask whichever replica runs `topic_id` to pause it.
    ///
    /// Only a `Running` topic can be paused; the transition itself is
    /// recorded by the run once its turn loop stops.
    pub async fn stop_topic(&self, topic_id: &str) -> Result<(), RunTopicError> {
        let mut topic = self.topic(topic_id).await?;
        topic.pause()?;
        info!(topic_id, "pause requested");
        self.pause.request_pause(topic_id).await?;
        Ok(())
    }

    // ==================== Working set ====================

    fn cached_topic(&self, topic_id: &str) -> Option<Topic> {
        self.working_set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(topic_id)
            .cloned()
    }

    fn store_topic(&self, topic: &Topic) {
        self.working_set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(topic.id.clone(), topic.clone());
    }

    fn evict_topic(&self, topic_id: &str) {
        self.working_set
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(topic_id);
    }

    // ==================== Run ====================

    /// Run `topic_id` until it pauses, reaches the turn bound, or fails.
    ///
    /// `owner` identifies who started the run, for logs and the transcript.
    pub async fn run_topic(&self, topic_id: &str, owner: &str) -> Result<RunReport, RunTopicError> {
        let lease_owner = format!("{}:{}", self.replica_id, uuid::Uuid::new_v4());
        let lease = match LeaseGuard::acquire(
            Arc::clone(&self.lock),
            topic_id,
            &lease_owner,
            self.params.run.lease_ttl,
        )
        .await
        {
            Ok(lease) => lease,
            Err(LockError::Held { holder, .. }) => {
                warn!(topic_id, holder = %holder, "topic already running elsewhere");
                return Err(RunTopicError::TopicLocked {
                    topic_id: topic_id.to_string(),
                    holder: Some(holder),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let result = self.run_with_lease(topic_id, owner, &lease).await;
        lease.release().await;

        match &result {
            Ok(report) => info!(topic_id, outcome = ?report.outcome, turns = report.turns, "run finished"),
            Err(e) => error!(topic_id, error = %e, "run aborted"),
        }
        self.conversation_logger.log(ConversationEvent::new(
            "run_finished",
            serde_json::json!({
                "topic_id": topic_id,
                "owner": owner,
                "outcome": match &result {
                    Ok(report) => format!("{:?}", report.outcome).to_lowercase(),
                    Err(e) => e.to_string(),
                },
            }),
        ));
        result
    }

    async fn load_topic(&self, topic_id: &str) -> Result<Topic, RunTopicError> {
        let mut topic = self.topic(topic_id).await?;
        // We hold the lease, so nobody is actually running it
        if topic.state == TopicState::Running {
            warn!(topic_id, "recovering topic left running by a previous driver");
            topic.state = TopicState::Paused;
        }
        Ok(topic)
    }

    async fn run_with_lease(
        &self,
        topic_id: &str,
        owner: &str,
        lease: &LeaseGuard,
    ) -> Result<RunReport, RunTopicError> {
        let mut topic = self.load_topic(topic_id).await?;
        topic.launch()?;
        self.repository
            .save_topic_state(topic_id, TopicState::Running)
            .await?;
        self.store_topic(&topic);

        info!(topic_id, owner, speeches = topic.speeches.len(), "run started");
        self.conversation_logger.log(ConversationEvent::new(
            "run_started",
            serde_json::json!({
                "topic_id": topic_id,
                "owner": owner,
                "subject": topic.subject,
                "resumed_speeches": topic.speeches.len(),
            }),
        ));

        let mut listener = self.pause.register(topic_id);
        let mut position = 0u64;
        let mut speaker = None;

        let (exit, turns) = match self.prepare(&topic).await {
            Ok((scheduler, docs)) => {
                let cursor = TurnCursor {
                    position: &mut position,
                    speaker: &mut speaker,
                };
                self.turn_loop(&mut topic, scheduler, &docs, lease, &mut listener, cursor)
                    .await
            }
            Err(e) => (LoopExit::Failed(e), 0),
        };
        drop(listener);

        // Keyed by whoever held the floor last, so viewers keep that turn's
        // cached fragments
        let end_role = speaker
            .or_else(|| topic.last_speech().map(|s| s.role_id.clone()))
            .unwrap_or_else(|| topic.moderator.clone());
        let end = TokenMessage::end(topic_id, end_role, position);
        if let Err(e) = self.publisher.publish(topic_id, &[end]).await {
            warn!(topic_id, error = %e, "failed to publish end marker");
        }

        let outcome = match exit {
            LoopExit::Failed(e) => {
                self.evict_topic(topic_id);
                return Err(e);
            }
            LoopExit::Paused => RunOutcome::Paused,
            LoopExit::TurnLimit => RunOutcome::TurnLimit,
        };

        topic.pause()?;
        if lease.verify().await {
            self.repository
                .save_topic_state(topic_id, TopicState::Paused)
                .await?;
        } else {
            warn!(topic_id, "lease lost before recording pause");
        }
        self.store_topic(&topic);

        Ok(RunReport { outcome, turns })
    }

    /// Scheduler positioned on the first speaker of this run, plus the
    /// supporting documents for participant framing.
    async fn prepare(&self, topic: &Topic) -> Result<(RoleScheduler, String), RunTopicError> {
        let moderator = self
            .repository
            .get_roles(std::slice::from_ref(&topic.moderator))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RepositoryError::NotFound(topic.moderator.clone()))?;
        let participants = self.repository.get_roles(&topic.participants).await?;

        let mut scheduler = RoleScheduler::new(topic.id.clone(), moderator, participants)?
            .resume_after(topic.last_speech());
        let last_content = topic
            .last_speech()
            .map(|s| s.content.clone())
            .unwrap_or_default();
        self.next_role(&mut scheduler, &last_content).await?;

        let docs = self.supporting_docs(topic).await;
        Ok((scheduler, docs))
    }

    /// Advance the scheduler past a turn whose text was `last_content`.
    async fn next_role(
        &self,
        scheduler: &mut RoleScheduler,
        last_content: &str,
    ) -> Result<(), RunTopicError> {
        if scheduler.needs_designation() {
            let name = self
                .extractor
                .extract(last_content)
                .await
                .map_err(RunTopicError::ExtractionFailed)?;
            debug!(topic_id = %scheduler.topic_id(), designated = %name, "next speaker extracted");
            scheduler.advance(Some(&name))?;
        } else {
            scheduler.advance(None)?;
        }
        Ok(())
    }

    async fn supporting_docs(&self, topic: &Topic) -> String {
        let mut snippets = Vec::new();
        for document_id in &topic.documents {
            match self
                .retriever
                .retrieve(document_id, &topic.subject, self.params.run.retrieval_top_k)
                .await
            {
                Ok(found) => snippets.extend(found),
                Err(e) => {
                    warn!(topic_id = %topic.id, document_id = %document_id, error = %e, "document retrieval failed")
                }
            }
        }
        snippets.join("\n\n")
    }

    async fn turn_loop(
        &self,
        topic: &mut Topic,
        mut scheduler: RoleScheduler,
        docs: &str,
        lease: &LeaseGuard,
        listener: &mut PauseListener,
        cursor: TurnCursor<'_>,
    ) -> (LoopExit, usize) {
        let TurnCursor { position, speaker } = cursor;
        let executor = ExecuteTurnUseCase::new(
            Arc::clone(&self.tools),
            Arc::clone(&self.conversation_logger),
            self.params.run.max_tool_rounds,
        );
        let mut history = SeminarPrompt::history(&topic.subject, &topic.speeches);
        let lease_lost = lease.lost();
        let mut completed = 0usize;

        loop {
            if completed >= self.params.run.max_turns {
                info!(topic_id = %topic.id, turns = completed, "turn bound reached");
                return (LoopExit::TurnLimit, completed);
            }
            if listener.try_recv() == Some(StateSignal::Pause) {
                return (LoopExit::Paused, completed);
            }

            let Some(role) = scheduler.current().cloned() else {
                return (LoopExit::Failed(DomainError::NoCurrentSpeaker.into()), completed);
            };
            let messages = match scheduler.build_messages(&history, docs) {
                Ok(messages) => messages,
                Err(e) => return (LoopExit::Failed(e.into()), completed),
            };
            let model = match self.gateway.chat_model(&role.model).await {
                Ok(model) => model,
                Err(e) => return (LoopExit::Failed(RunTopicError::StreamError(e)), completed),
            };

            *speaker = Some(role.id.clone());
            info!(topic_id = %topic.id, role = %role.name, kind = %role.kind, "turn started");
            self.conversation_logger.log(ConversationEvent::new(
                "turn_started",
                serde_json::json!({
                    "topic_id": topic.id,
                    "role_id": role.id,
                    "role": role.name,
                    "kind": role.kind.as_str(),
                }),
            ));

            let turn_cancel = CancellationToken::new();
            let buffer = TokenBuffer::start(
                self.params.streaming.batch_size,
                self.params.streaming.flush_interval,
                Arc::clone(&self.publisher) as Arc<dyn BatchSender>,
                turn_cancel.clone(),
            );

            let mut lost_lease = false;
            let outcome = {
                let turn = executor.execute(
                    model.as_ref(),
                    TurnInput {
                        topic_id: &topic.id,
                        role: &role,
                        messages,
                    },
                    &buffer,
                    position,
                    &turn_cancel,
                );
                tokio::pin!(turn);

                let mut signals_open = true;
                loop {
                    tokio::select! {
                        biased;
                        signal = listener.recv(), if signals_open => match signal {
                            Some(StateSignal::Pause) => {
                                debug!(topic_id = %topic.id, "pause signal received mid-turn");
                                turn_cancel.cancel();
                            }
                            Some(_) => {}
                            None => signals_open = false,
                        },
                        _ = lease_lost.cancelled(), if !lost_lease => {
                            lost_lease = true;
                            turn_cancel.cancel();
                        }
                        outcome = &mut turn => break outcome,
                    }
                }
            };
            buffer.stop().await;

            let text = match outcome {
                TurnOutcome::Completed(text) => text,
                TurnOutcome::Paused if lost_lease => {
                    return (LoopExit::Failed(RunTopicError::LeaseLost(topic.id.clone())), completed);
                }
                TurnOutcome::Paused => {
                    info!(topic_id = %topic.id, role = %role.name, "turn paused, partial output discarded");
                    self.conversation_logger.log(ConversationEvent::new(
                        "turn_paused",
                        serde_json::json!({ "topic_id": topic.id, "role": role.name }),
                    ));
                    return (LoopExit::Paused, completed);
                }
                TurnOutcome::Failed(e) => {
                    self.conversation_logger.log(ConversationEvent::new(
                        "turn_failed",
                        serde_json::json!({
                            "topic_id": topic.id,
                            "role": role.name,
                            "error": e.to_string(),
                        }),
                    ));
                    return (LoopExit::Failed(RunTopicError::StreamError(e)), completed);
                }
            };

            if let Err(e) = self.next_role(&mut scheduler, &text).await {
                return (LoopExit::Failed(e), completed);
            }

            if !lease.verify().await {
                return (LoopExit::Failed(RunTopicError::LeaseLost(topic.id.clone())), completed);
            }
            let speech = Speech::new(topic.id.clone(), role.id.clone(), role.name.clone(), text);
            if let Err(e) = self.repository.save_speech(&speech).await {
                return (LoopExit::Failed(e.into()), completed);
            }

            history.push(Message::assistant(SeminarPrompt::format_speech(
                &speech.role_name,
                &speech.content,
            )));
            self.conversation_logger.log(ConversationEvent::new(
                "speech_saved",
                serde_json::json!({
                    "topic_id": speech.topic_id,
                    "role_id": speech.role_id,
                    "role": speech.role_name,
                    "content": speech.content,
                    "time": speech.time.to_rfc3339(),
                }),
            ));
            topic.append_speech(speech);
            self.store_topic(topic);
            completed += 1;
        }
    }
}
