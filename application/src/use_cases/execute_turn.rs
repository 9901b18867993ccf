//! Execute Turn use case
//!
//! Runs one role's turn: streams the model response into a [`TokenBuffer`],
//! separates reasoning from visible text, dispatches tool calls and feeds
//! their results back until the model answers without tools, and stops
//! promptly when the turn is cancelled.

use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::llm_gateway::{ChatModel, GatewayError};
use crate::ports::tool_executor::ToolExecutorPort;
use crate::streaming::TokenBuffer;
use seminar_domain::{
    ContentType, Message, Role, StateSignal, StreamEvent, TokenMessage, ToolCall,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a single turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Natural completion with the turn's visible text
    Completed(String),
    /// Cancelled; any partial output was discarded
    Paused,
    /// The model stream failed
    Failed(GatewayError),
}

impl TurnOutcome {
    pub fn signal(&self) -> StateSignal {
        match self {
            TurnOutcome::Completed(_) => StateSignal::Normal,
            TurnOutcome::Paused => StateSignal::Pause,
            TurnOutcome::Failed(_) => StateSignal::Error,
        }
    }
}

/// Input for one turn
pub struct TurnInput<'a> {
    pub topic_id: &'a str,
    pub role: &'a Role,
    pub messages: Vec<Message>,
}

pub struct ExecuteTurnUseCase {
    tools: Arc<dyn ToolExecutorPort>,
    conversation_logger: Arc<dyn ConversationLogger>,
    max_tool_rounds: usize,
}

impl ExecuteTurnUseCase {
    pub fn new(
        tools: Arc<dyn ToolExecutorPort>,
        conversation_logger: Arc<dyn ConversationLogger>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            tools,
            conversation_logger,
            max_tool_rounds,
        }
    }

    /// Run the turn to completion, cancellation or failure.
    ///
    /// `position` is the run's ordering counter for streamed fragments.
    pub async fn execute(
        &self,
        model: &dyn ChatModel,
        input: TurnInput<'_>,
        buffer: &TokenBuffer,
        position: &mut u64,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let TurnInput {
            topic_id,
            role,
            mut messages,
        } = input;
        let descriptors = self.tools.descriptors();
        let mut text = String::new();

        for round in 0..=self.max_tool_rounds {
            if cancel.is_cancelled() {
                return TurnOutcome::Paused;
            }

            // The last round runs without tools so the model has to answer
            let tools = if round < self.max_tool_rounds {
                descriptors.as_slice()
            } else {
                &[]
            };

            let handle = tokio::select! {
                biased;
                _ = cancel.cancelled() => return TurnOutcome::Paused,
                result = model.stream(&messages, tools, cancel.clone()) => match result {
                    Ok(handle) => handle,
                    Err(e) if e.is_cancelled() => return TurnOutcome::Paused,
                    Err(e) => return TurnOutcome::Failed(e),
                },
            };
            let mut receiver = handle.receiver;

            let mut round_text = String::new();
            let mut calls: Vec<ToolCall> = Vec::new();

            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!(topic_id, role = %role.name, "turn cancelled mid-stream");
                        return TurnOutcome::Paused;
                    }
                    event = receiver.recv() => event,
                };

                match event {
                    Some(StreamEvent::Reasoning(fragment)) => {
                        push(buffer, topic_id, role, ContentType::Reasoning, fragment, position);
                    }
                    Some(StreamEvent::Delta(fragment)) => {
                        round_text.push_str(&fragment);
                        push(buffer, topic_id, role, ContentType::Text, fragment, position);
                    }
                    Some(StreamEvent::ToolCalls(requested)) => calls.extend(requested),
                    Some(StreamEvent::Error(e)) => {
                        return TurnOutcome::Failed(GatewayError::RequestFailed(e));
                    }
                    Some(StreamEvent::Completed) => break,
                    None if cancel.is_cancelled() => return TurnOutcome::Paused,
                    None => {
                        warn!(topic_id, role = %role.name, "stream closed before completion");
                        return TurnOutcome::Failed(GatewayError::RequestFailed(
                            "stream closed before completion".into(),
                        ));
                    }
                }
            }

            // Cancellation may land right after `Completed`
            if cancel.is_cancelled() {
                return TurnOutcome::Paused;
            }

            text.push_str(&round_text);

            if calls.is_empty() {
                buffer.flush();
                return TurnOutcome::Completed(text);
            }

            if tools.is_empty() {
                warn!(
                    topic_id,
                    role = %role.name,
                    "tool calls requested after the last tool round, ignoring"
                );
                buffer.flush();
                return TurnOutcome::Completed(text);
            }

            messages.push(Message::assistant_with_tool_calls(round_text, calls.clone()));
            for call in &calls {
                let result = match self.tools.invoke(call).await {
                    Ok(output) => output,
                    Err(e) => {
                        warn!(topic_id, tool = %call.name, error = %e, "tool call failed");
                        format!("Error: {}", e)
                    }
                };
                info!(topic_id, role = %role.name, tool = %call.name, "tool call executed");
                self.conversation_logger.log(ConversationEvent::new(
                    "tool_call",
                    serde_json::json!({
                        "topic_id": topic_id,
                        "role": role.name,
                        "tool": call.name,
                        "arguments": call.arguments,
                        "result": result,
                    }),
                ));
                messages.push(Message::tool_result(call.id.clone(), result));
            }
        }

        buffer.flush();
        TurnOutcome::Completed(text)
    }
}

fn push(
    buffer: &TokenBuffer,
    topic_id: &str,
    role: &Role,
    content_type: ContentType,
    fragment: String,
    position: &mut u64,
) {
    if fragment.is_empty() {
        return;
    }
    let message = TokenMessage::new(topic_id, role, content_type, fragment, *position);
    *position += 1;
    if buffer.add(message) {
        buffer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::conversation_logger::NoConversationLogger;
    use crate::ports::tool_executor::NoTools;
    use crate::streaming::BatchSender;
    use crate::test_support::{RecordingSender, RecordingTools, ScriptedModel, ScriptedReply};
    use seminar_domain::{MessageRole, ModelSelector};
    use std::time::Duration;

    fn role() -> Role {
        Role::participant("a", "Alice", ModelSelector::new("m"))
    }

    fn buffer(sender: Arc<RecordingSender>, cancel: &CancellationToken) -> TokenBuffer {
        TokenBuffer::start(4, Duration::from_millis(5), sender as Arc<dyn BatchSender>, cancel.clone())
    }

    fn use_case(tools: Arc<dyn ToolExecutorPort>) -> ExecuteTurnUseCase {
        ExecuteTurnUseCase::new(tools, Arc::new(NoConversationLogger), 3)
    }

    #[tokio::test]
    async fn test_completed_turn_streams_reasoning_and_text() {
        let model = ScriptedModel::new(vec![ScriptedReply::events(vec![
            StreamEvent::Reasoning("thinking".into()),
            StreamEvent::Delta("Hello ".into()),
            StreamEvent::Delta("there".into()),
            StreamEvent::Completed,
        ])]);
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender.clone(), &cancel);
        let mut position = 0;

        let role = role();
        let outcome = use_case(Arc::new(NoTools))
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![Message::user("go")] },
                &buf,
                &mut position,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(outcome, TurnOutcome::Completed("Hello there".into()));
        assert_eq!(outcome.signal(), StateSignal::Normal);
        assert_eq!(position, 3);

        let sent = sender.messages();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].content_type, ContentType::Reasoning);
        assert_eq!(sent[1].content_type, ContentType::Text);
        assert_eq!(sent[2].content, "there");
    }

    #[tokio::test]
    async fn test_stream_error_fails_turn() {
        let model = ScriptedModel::new(vec![ScriptedReply::events(vec![
            StreamEvent::Delta("par".into()),
            StreamEvent::Error("connection reset".into()),
        ])]);
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender, &cancel);
        let role = role();

        let outcome = use_case(Arc::new(NoTools))
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed(GatewayError::RequestFailed("connection reset".into()))
        );
        assert_eq!(outcome.signal(), StateSignal::Error);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_reports_pause() {
        let model = ScriptedModel::new(vec![ScriptedReply::hanging(vec![StreamEvent::Delta(
            "partial".into(),
        )])]);
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender.clone(), &cancel);
        let role = role();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let outcome = use_case(Arc::new(NoTools))
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        canceller.await.unwrap();
        buf.stop().await;

        assert_eq!(outcome, TurnOutcome::Paused);
        assert_eq!(outcome.signal(), StateSignal::Pause);
        // Fragments already streamed still reach viewers
        assert_eq!(sender.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_calls_are_dispatched_and_fed_back() {
        let model = ScriptedModel::new(vec![
            ScriptedReply::events(vec![
                StreamEvent::Delta("Let me check. ".into()),
                StreamEvent::ToolCalls(vec![ToolCall::new("c1", "lookup", r#"{"q":"kant"}"#)]),
                StreamEvent::Completed,
            ]),
            ScriptedReply::events(vec![
                StreamEvent::Delta("Kant was born in 1724.".into()),
                StreamEvent::Completed,
            ]),
        ]);
        let tools = Arc::new(RecordingTools::new(vec!["lookup"]));
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender, &cancel);
        let role = role();

        let outcome = use_case(tools.clone())
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![Message::user("go")] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(
            outcome,
            TurnOutcome::Completed("Let me check. Kant was born in 1724.".into())
        );
        assert_eq!(tools.invoked(), vec!["lookup".to_string()]);

        let requests = model.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].tool_count, 1);
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert_eq!(second[1].role, MessageRole::Assistant);
        assert_eq!(second[1].tool_calls.len(), 1);
        assert_eq!(second[2].role, MessageRole::Tool);
        assert_eq!(second[2].tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_tool_failure_is_returned_to_model() {
        let model = ScriptedModel::new(vec![
            ScriptedReply::events(vec![
                StreamEvent::ToolCalls(vec![ToolCall::new("c1", "broken", "{}")]),
                StreamEvent::Completed,
            ]),
            ScriptedReply::text("Never mind."),
        ]);
        let tools = Arc::new(RecordingTools::new(vec!["broken"]).failing());
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender, &cancel);
        let role = role();

        let outcome = use_case(tools)
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(outcome, TurnOutcome::Completed("Never mind.".into()));
        let tool_message = &model.requests()[1].messages[1];
        assert!(tool_message.content.starts_with("Error:"));
    }

    #[tokio::test]
    async fn test_last_round_runs_without_tools() {
        let call = || {
            ScriptedReply::events(vec![
                StreamEvent::ToolCalls(vec![ToolCall::new("c", "lookup", "{}")]),
                StreamEvent::Completed,
            ])
        };
        let model = ScriptedModel::new(vec![call(), call(), call(), ScriptedReply::text("done")]);
        let tools = Arc::new(RecordingTools::new(vec!["lookup"]));
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender, &cancel);
        let role = role();

        let outcome = use_case(tools.clone())
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(outcome, TurnOutcome::Completed("done".into()));
        assert_eq!(tools.invoked().len(), 3);
        let requests = model.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].tool_count, 0);
    }

    #[tokio::test]
    async fn test_stream_closed_without_completion_fails_turn() {
        let model = ScriptedModel::new(vec![ScriptedReply::events(vec![StreamEvent::Delta(
            "Welcome, @Ali".into(),
        )])]);
        let sender = Arc::new(RecordingSender::default());
        let cancel = CancellationToken::new();
        let buf = buffer(sender, &cancel);
        let role = role();

        let outcome = use_case(Arc::new(NoTools))
            .execute(
                &model,
                TurnInput { topic_id: "t1", role: &role, messages: vec![] },
                &buf,
                &mut 0,
                &cancel,
            )
            .await;
        buf.stop().await;

        assert_eq!(
            outcome,
            TurnOutcome::Failed(GatewayError::RequestFailed(
                "stream closed before completion".into()
            ))
        );
        assert_eq!(outcome.signal(), StateSignal::Error);
    }
}
