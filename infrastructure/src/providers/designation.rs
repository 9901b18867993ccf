//! Next-speaker extraction through an auxiliary chat model.

use async_trait::async_trait;
use seminar_application::ports::designation::DesignationExtractor;
use seminar_application::ports::llm_gateway::{GatewayError, LlmGateway};
use seminar_domain::{Message, ModelSelector, SeminarPrompt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Asks a small model which `@name` the moderator handed the floor to.
pub struct LlmDesignationExtractor {
    gateway: Arc<dyn LlmGateway>,
    selector: ModelSelector,
}

impl LlmDesignationExtractor {
    pub fn new(gateway: Arc<dyn LlmGateway>, selector: ModelSelector) -> Self {
        Self { gateway, selector }
    }
}

#[async_trait]
impl DesignationExtractor for LlmDesignationExtractor {
    async fn extract(&self, moderator_text: &str) -> Result<String, GatewayError> {
        let model = self.gateway.chat_model(&self.selector).await?;
        let messages = [
            Message::system(SeminarPrompt::designation_system()),
            Message::user(moderator_text),
        ];
        let answer = model
            .stream(&messages, &[], CancellationToken::new())
            .await?
            .collect_text()
            .await?;

        let name = answer.trim().trim_start_matches('@').trim().to_string();
        debug!(model = %model.model_name(), designated = %name, "designation extracted");
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seminar_application::ports::llm_gateway::{ChatModel, StreamHandle};
    use seminar_domain::{StreamEvent, ToolDescriptor};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct FixedModel {
        reply: Result<String, GatewayError>,
        seen: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ChatModel for FixedModel {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn stream(
            &self,
            messages: &[Message],
            _tools: &[ToolDescriptor],
            _cancel: CancellationToken,
        ) -> Result<StreamHandle, GatewayError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            let reply = self.reply.clone()?;
            let (tx, rx) = mpsc::channel(4);
            tx.send(StreamEvent::Delta(reply)).await.unwrap();
            tx.send(StreamEvent::Completed).await.unwrap();
            Ok(StreamHandle::new(rx))
        }
    }

    struct FixedGateway(Arc<FixedModel>);

    #[async_trait]
    impl LlmGateway for FixedGateway {
        async fn chat_model(&self, _selector: &ModelSelector) -> Result<Arc<dyn ChatModel>, GatewayError> {
            Ok(self.0.clone())
        }
    }

    fn extractor(reply: Result<&str, GatewayError>) -> (LlmDesignationExtractor, Arc<FixedModel>) {
        let model = Arc::new(FixedModel {
            reply: reply.map(String::from),
            seen: Mutex::new(Vec::new()),
        });
        let gateway = Arc::new(FixedGateway(model.clone()));
        (
            LlmDesignationExtractor::new(gateway, ModelSelector::new("small")),
            model,
        )
    }

    #[tokio::test]
    async fn test_extracts_trimmed_name() {
        let (extractor, model) = extractor(Ok(" @Alice\n"));
        let name = extractor.extract("Next, @Alice please.").await.unwrap();
        assert_eq!(name, "Alice");

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].content, SeminarPrompt::designation_system());
        assert_eq!(seen[1].content, "Next, @Alice please.");
    }

    #[tokio::test]
    async fn test_no_designation_yields_empty() {
        let (extractor, _) = extractor(Ok(""));
        assert_eq!(extractor.extract("Thanks everyone.").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_failures_propagate() {
        let (extractor, _) = extractor(Err(GatewayError::Timeout));
        assert_eq!(
            extractor.extract("@Bob?").await.unwrap_err(),
            GatewayError::Timeout
        );
    }
}
