//! Application layer for the seminar engine
//!
//! This crate contains the turn loop, the streaming and broadcast pipeline,
//! cross-process coordination, and the port definitions the infrastructure
//! layer implements. It depends only on the domain layer.

pub mod broadcast;
pub mod config;
pub mod coordination;
pub mod ports;
pub mod streaming;
pub mod use_cases;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use broadcast::{BroadcastHub, BrokerBatchSender, FanoutReport, Subscription};
pub use config::{BrokerParams, RunParams, SeminarParams, StreamingParams};
pub use coordination::{LeaseGuard, PauseCoordinator, PauseListener};
pub use ports::{
    broker::{BrokerError, BrokerReader, BrokerRecord, MessageBroker},
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    designation::DesignationExtractor,
    llm_gateway::{ChatModel, GatewayError, LlmGateway, StreamHandle},
    repository::{RepositoryError, SeminarRepository},
    retrieval::{DocumentRetriever, NoRetrieval, RetrievalError},
    tool_executor::{NoTools, ToolError, ToolExecutorPort},
    topic_lock::{LockError, TopicLock},
};
pub use streaming::{BatchSender, TokenBuffer};
pub use use_cases::execute_turn::{ExecuteTurnUseCase, TurnInput, TurnOutcome};
pub use use_cases::run_topic::{RunOutcome, RunReport, RunTopicError, SeminarService};
