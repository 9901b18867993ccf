//! Dependency injection: builds the service from file configuration.

use anyhow::{Context, Result, bail};
use seminar_application::{
    BrokerError, ConversationLogger, DesignationExtractor, DocumentRetriever, LlmGateway,
    MessageBroker, SeminarParams, SeminarRepository, SeminarService, ToolExecutorPort,
};
use seminar_domain::ModelSelector;
use seminar_infrastructure::{
    FileConfig, InMemoryBroker, InMemoryTopicLock, JsonHistoryRepository, JsonlConversationLogger,
    LlmDesignationExtractor, OpenAiGateway, default_registry, load_documents, seed_repository,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const ATTACH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Runtime {
    pub service: Arc<SeminarService>,
    broker: Arc<InMemoryBroker>,
    group: String,
}

impl Runtime {
    pub async fn build(
        config: &FileConfig,
        params: SeminarParams,
        replica_id: Option<String>,
    ) -> Result<Self> {
        let gateway: Arc<dyn LlmGateway> = Arc::new(
            OpenAiGateway::new(config.llm.base_url.clone(), config.llm.api_key())
                .with_request_timeout(config.llm.request_timeout()),
        );
        if config.llm.api_key().is_none() {
            warn!(
                env = %config.llm.api_key_env,
                "no API key in the environment; requests are sent unauthenticated"
            );
        }
        let extractor: Arc<dyn DesignationExtractor> = Arc::new(LlmDesignationExtractor::new(
            Arc::clone(&gateway),
            ModelSelector::new(config.llm.extraction_model.clone()),
        ));

        let seeded = seed_repository(config).context("Failed to seed topics")?;
        let repository: Arc<dyn SeminarRepository> = match &config.storage.history_path {
            Some(path) => Arc::new(
                JsonHistoryRepository::open(seeded, path)
                    .await
                    .context("Failed to load seminar history")?,
            ),
            None => Arc::new(seeded),
        };
        let retriever: Arc<dyn DocumentRetriever> =
            Arc::new(load_documents(config).context("Failed to load documents")?);
        let tools: Arc<dyn ToolExecutorPort> = Arc::new(default_registry(
            Some(Arc::clone(&retriever)),
            params.run.retrieval_top_k,
        ));

        let broker = Arc::new(InMemoryBroker::new(config.broker.partitions));
        let lock = Arc::new(InMemoryTopicLock::new());

        let mut service = SeminarService::new(
            gateway,
            extractor,
            repository,
            lock,
            Arc::clone(&broker) as Arc<dyn MessageBroker>,
            params.clone(),
        )
        .with_retriever(retriever)
        .with_tools(tools);

        if let Some(path) = &config.transcript.path {
            match JsonlConversationLogger::new(path) {
                Some(logger) => {
                    info!(path = %path.display(), "writing transcript");
                    service = service
                        .with_conversation_logger(Arc::new(logger) as Arc<dyn ConversationLogger>);
                }
                None => warn!(path = %path.display(), "transcript disabled: cannot open file"),
            }
        }
        if let Some(replica_id) = replica_id {
            service = service.with_replica_id(replica_id);
        }

        let group = params.broker.group_for(service.replica_id());
        Ok(Self {
            service: Arc::new(service),
            broker,
            group,
        })
    }

    /// Start the broker consumers and wait until every one has attached,
    /// so nothing published by the first turn is missed.
    pub async fn start_consumers(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<JoinHandle<Result<(), BrokerError>>>> {
        let handles = self.service.spawn_consumers(cancel);
        let expected = handles.len();
        let attached = tokio::time::timeout(ATTACH_TIMEOUT, async {
            while self.broker.attached(&self.group) < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        if attached.is_err() {
            bail!(
                "broker consumers did not attach ({} of {})",
                self.broker.attached(&self.group),
                expected
            );
        }
        Ok(handles)
    }
}
