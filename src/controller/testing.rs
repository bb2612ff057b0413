//! Mock transport for controller tests
//!
//! Responses are queued up front; channel-backed bodies let a test decide
//! exactly when each chunk arrives.

use crate::error::TransportError;
use crate::transport::{
    AgentChatRequest, BodyStream, ChatTransport, HealthStatus, StreamResponse,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

type ChunkSender = mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>;

enum MockResponse {
    Body(Vec<String>),
    Channel(mpsc::UnboundedReceiver<Result<Vec<u8>, TransportError>>),
    Status(u16),
    NoBody,
    Error(TransportError),
}

/// Transport that replays queued responses in order
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<AgentChatRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a 200 response whose body is delivered as the given chunks
    pub fn queue_body<S: Into<String>>(&self, chunks: impl IntoIterator<Item = S>) {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.push(MockResponse::Body(chunks));
    }

    /// Queue a 200 response fed by the returned sender; dropping it ends the body
    pub fn queue_channel(&self) -> ChunkSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(MockResponse::Channel(rx));
        tx
    }

    pub fn queue_status(&self, status: u16) {
        self.push(MockResponse::Status(status));
    }

    pub fn queue_missing_body(&self) {
        self.push(MockResponse::NoBody);
    }

    pub fn queue_error(&self, error: TransportError) {
        self.push(MockResponse::Error(error));
    }

    pub fn recorded_requests(&self) -> Vec<AgentChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn open_stream(
        &self,
        request: &AgentChatRequest,
    ) -> Result<StreamResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(MockResponse::Body(chunks)) => {
                let body: BodyStream = Box::pin(futures::stream::iter(
                    chunks
                        .into_iter()
                        .map(|c| Ok::<_, TransportError>(c.into_bytes())),
                ));
                Ok(StreamResponse::new(200, body))
            }
            Some(MockResponse::Channel(rx)) => {
                let body: BodyStream = Box::pin(UnboundedReceiverStream::new(rx));
                Ok(StreamResponse::new(200, body))
            }
            Some(MockResponse::Status(status)) => Ok(StreamResponse::new(
                status,
                Box::pin(futures::stream::empty::<Result<Vec<u8>, TransportError>>()),
            )),
            Some(MockResponse::NoBody) => Ok(StreamResponse {
                status: 200,
                body: None,
            }),
            Some(MockResponse::Error(error)) => Err(error),
            None => Err(TransportError::network("No mock response queued")),
        }
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus {
            ok: true,
            message: None,
            gpt_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ConversationUpdate, StreamController, FINISHED_HISTORY};
    use crate::panel::ToolPanel;
    use crate::session::SessionId;
    use crate::state_machine::{CancelReason, StreamId, StreamStatus};
    use crate::system_prompt::{DatasetSummary, GREETING_INSTRUCTION};
    use crate::transcript::Role;
    use crate::transport::ChatRole;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::sync::broadcast;

    type TestController = StreamController<Arc<MockTransport>>;

    fn frame(event: &Value) -> String {
        format!("data: {event}\n\n")
    }

    fn final_frame(text: &str) -> String {
        frame(&json!({"type": "final", "text": text}))
    }

    fn setup() -> (TestController, Arc<MockTransport>) {
        let transport = MockTransport::new();
        let controller = StreamController::new(
            SessionId::from("session-test".to_string()),
            Arc::clone(&transport),
        );
        (controller, transport)
    }

    async fn settle(controller: &mut TestController, stream: StreamId) -> StreamStatus {
        tokio::time::timeout(Duration::from_secs(5), controller.run_until_settled(stream))
            .await
            .expect("stream did not settle")
            .expect("unknown stream")
    }

    fn drain(rx: &mut broadcast::Receiver<ConversationUpdate>) -> Vec<ConversationUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn content(controller: &TestController, index: usize) -> String {
        controller.conversation().messages()[index]
            .content()
            .to_string()
    }

    #[tokio::test]
    async fn test_simple_question_completes() {
        let (mut controller, transport) = setup();
        transport.queue_body([
            frame(&json!({"type": "tool_call", "name": "business_insight", "args": {}})),
            final_frame("Signups grew 12%."),
        ]);

        let stream = controller.submit("How did signups change?");
        assert_eq!(controller.active_stream(), Some(stream));
        assert_eq!(settle(&mut controller, stream).await, StreamStatus::Completed);

        let messages = controller.conversation().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role(), Role::User);
        assert_eq!(messages[1].content(), "Signups grew 12%.");
        assert!(controller.conversation().visible_thinking().is_none());
        assert!(controller.active_stream().is_none());

        let requests = transport.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, "session-test");
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].messages[0].content, "How did signups change?");
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_abort_stream() {
        let (mut controller, transport) = setup();
        let mut rx = controller.subscribe();
        transport.queue_body([
            final_frame("x"),
            "data: not-json\n\n".to_string(),
            final_frame("y"),
        ]);

        let stream = controller.submit("q");
        assert_eq!(settle(&mut controller, stream).await, StreamStatus::Completed);
        assert_eq!(content(&controller, 1), "xy");

        let protocol_errors = drain(&mut rx)
            .into_iter()
            .filter(|u| matches!(u, ConversationUpdate::ProtocolError { .. }))
            .count();
        assert_eq!(protocol_errors, 1);
    }

    #[tokio::test]
    async fn test_new_question_supersedes_active_stream() {
        let (mut controller, transport) = setup();
        let first_body = transport.queue_channel();
        transport.queue_body([final_frame("Second answer")]);

        let first = controller.submit("first");
        first_body.send(Ok(final_frame("partial").into_bytes())).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while content(&controller, 1).is_empty() {
                controller.process_next().await;
            }
        })
        .await
        .unwrap();

        let second = controller.submit("second");
        assert_eq!(controller.status(first), Some(StreamStatus::Aborted));

        // Bytes still in flight for the old stream must not land anywhere
        let _ = first_body.send(Ok(final_frame(" late").into_bytes()));
        drop(first_body);
        assert_eq!(settle(&mut controller, second).await, StreamStatus::Completed);

        let marker = CancelReason::Superseded.marker();
        let interrupted = content(&controller, 1);
        assert_eq!(interrupted, format!("partial{marker}"));
        assert_eq!(interrupted.matches(marker).count(), 1);
        assert_eq!(content(&controller, 3), "Second answer");

        let requests = transport.recorded_requests();
        let history = &requests[1].messages;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].role, ChatRole::Assistant);
        assert_eq!(history[1].content, interrupted);
        assert_eq!(history[2].content, "second");
    }

    #[tokio::test]
    async fn test_explicit_cancel_marks_message() {
        let (mut controller, transport) = setup();
        let _body = transport.queue_channel();

        let stream = controller.submit("slow question");
        assert_eq!(controller.cancel_active(), Some(stream));
        assert_eq!(controller.status(stream), Some(StreamStatus::Aborted));
        assert!(controller.active_stream().is_none());
        assert_eq!(content(&controller, 1), CancelReason::Requested.marker());

        // Cancelling again is a no-op
        controller.cancel(stream);
        assert_eq!(content(&controller, 1), CancelReason::Requested.marker());
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let (mut controller, transport) = setup();
        let mut rx = controller.subscribe();
        transport.queue_body([final_frame("Done.")]);

        let stream = controller.submit("q");
        settle(&mut controller, stream).await;
        drain(&mut rx);

        controller.cancel(stream);
        assert_eq!(controller.status(stream), Some(StreamStatus::Completed));
        assert_eq!(content(&controller, 1), "Done.");
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_bad_status_fails_stream() {
        let (mut controller, transport) = setup();
        let mut rx = controller.subscribe();
        transport.queue_status(500);

        let stream = controller.submit("q");
        assert_eq!(settle(&mut controller, stream).await, StreamStatus::Failed);
        assert_eq!(content(&controller, 1), "");

        let failures: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|u| match u {
                ConversationUpdate::StreamFailed { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(failures, vec!["Bad response: 500".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_body_and_network_error_fail() {
        let (mut controller, transport) = setup();
        transport.queue_missing_body();
        transport.queue_error(TransportError::network("connection refused"));

        let first = controller.submit("q1");
        assert_eq!(settle(&mut controller, first).await, StreamStatus::Failed);

        let second = controller.submit("q2");
        assert_eq!(settle(&mut controller, second).await, StreamStatus::Failed);
        assert!(controller.active_stream().is_none());
    }

    #[tokio::test]
    async fn test_tool_results_become_panels() {
        let (mut controller, transport) = setup();
        let mut rx = controller.subscribe();
        transport.queue_body([
            frame(&json!({"type": "tool_call", "name": "business_insight", "args": {}})),
            frame(&json!({
                "type": "tool_result",
                "name": "business_insight",
                "result": {
                    "insight": "Mobile converts best",
                    "columns": ["device", "rate"],
                    "rows": [["mobile", 0.4], ["desktop", 0.2]]
                }
            })),
            frame(&json!({"type": "tool_result", "name": "chartjs_data", "result": {}})),
            frame(&json!({"type": "query_update", "query": "conversion by device"})),
            final_frame("Mobile leads."),
        ]);

        let stream = controller.submit("Which device converts best?");
        settle(&mut controller, stream).await;

        let conversation = controller.conversation();
        assert_eq!(conversation.panels().len(), 1);
        let ToolPanel::BusinessInsight { insight, table } = &conversation.panels()[0] else {
            panic!("expected insight panel");
        };
        assert_eq!(insight.as_deref(), Some("Mobile converts best"));
        assert_eq!(table.as_ref().map(|t| t.rows.len()), Some(2));
        assert_eq!(conversation.adjusted_query(), Some("conversion by device"));

        let updates = drain(&mut rx);
        let steps: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                ConversationUpdate::ThinkingStep { step, .. } => Some(step.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            steps,
            vec![
                "Calling tool: business_insight",
                "Received result from: business_insight",
                "Received result from: chartjs_data",
            ]
        );
        assert!(updates
            .iter()
            .any(|u| matches!(u, ConversationUpdate::ThinkingDismissed)));
    }

    #[tokio::test]
    async fn test_body_end_without_final_completes() {
        let (mut controller, transport) = setup();
        transport.queue_body([frame(
            &json!({"type": "tool_call", "name": "sql_tutor", "args": {}}),
        )]);

        let stream = controller.submit("q");
        assert_eq!(settle(&mut controller, stream).await, StreamStatus::Completed);
        assert_eq!(content(&controller, 1), "");
    }

    #[tokio::test]
    async fn test_greeting_runs_once_and_skips_transcript() {
        let (mut controller, transport) = setup();
        transport.queue_body([final_frame("Hi! Ask me about your data.")]);

        let stream = controller.greet().unwrap();
        assert!(controller.greet().is_none());
        settle(&mut controller, stream).await;

        let messages = controller.conversation().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role(), Role::Assistant);

        let request = &transport.recorded_requests()[0];
        assert_eq!(request.messages[0].role, ChatRole::System);
        assert_eq!(request.messages[1].content, GREETING_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_upload_preface_sent_once() {
        let (mut controller, transport) = setup();
        controller.set_datasets(vec![DatasetSummary::new("sales.csv", ["region"])]);
        transport.queue_body([final_frame("a")]);
        transport.queue_body([final_frame("b")]);

        let first = controller.submit("q1");
        settle(&mut controller, first).await;
        let second = controller.submit("q2");
        settle(&mut controller, second).await;

        let requests = transport.recorded_requests();
        assert!(requests[0].messages[0].content.starts_with("Context:"));
        assert_eq!(requests[0].messages.len(), 2);
        assert_eq!(requests[1].messages[0].content, "q1");
        assert_eq!(requests[1].messages.len(), 3);
    }

    #[tokio::test]
    async fn test_reset_clears_conversation() {
        let (mut controller, transport) = setup();
        let _body = transport.queue_channel();
        let stream = controller.submit("q");

        controller.reset(SessionId::from("fresh".to_string()));
        assert_eq!(controller.session_id().as_str(), "fresh");
        assert!(controller.conversation().messages().is_empty());
        assert!(controller.state(stream).is_none());
        assert!(controller.active_stream().is_none());
    }

    #[tokio::test]
    async fn test_body_error_dismisses_thinking() {
        let (mut controller, transport) = setup();
        let mut rx = controller.subscribe();
        let body = transport.queue_channel();
        let call = frame(&json!({"type": "tool_call", "name": "sql_tutor", "args": {}}));
        body.send(Ok(call.into_bytes())).unwrap();
        body.send(Err(TransportError::body("connection reset"))).unwrap();

        let stream = controller.submit("q");
        assert_eq!(settle(&mut controller, stream).await, StreamStatus::Failed);
        assert!(controller.conversation().visible_thinking().is_none());

        let updates = drain(&mut rx);
        assert!(updates
            .iter()
            .any(|u| matches!(u, ConversationUpdate::ThinkingStep { .. })));
        assert!(updates
            .iter()
            .any(|u| matches!(u, ConversationUpdate::ThinkingDismissed)));
    }

    #[tokio::test]
    async fn test_finished_streams_are_pruned() {
        let (mut controller, transport) = setup();
        transport.queue_body([final_frame("a")]);
        transport.queue_body([final_frame("b")]);

        let first = controller.submit("q1");
        settle(&mut controller, first).await;
        let second = controller.submit("q2");
        settle(&mut controller, second).await;

        assert!(controller.streams.is_empty());
        assert!(controller.state(first).is_none());
        assert_eq!(controller.status(first), Some(StreamStatus::Completed));
        assert_eq!(controller.status(second), Some(StreamStatus::Completed));
    }

    #[tokio::test]
    async fn test_finished_history_is_bounded() {
        let (mut controller, transport) = setup();
        let mut streams = Vec::new();
        for i in 0..=FINISHED_HISTORY {
            transport.queue_body([final_frame(&format!("answer {i}"))]);
            let stream = controller.submit(format!("q{i}"));
            settle(&mut controller, stream).await;
            streams.push(stream);
        }

        assert!(controller.streams.is_empty());
        assert_eq!(controller.finished.len(), FINISHED_HISTORY);
        assert_eq!(controller.status(streams[0]), None);
        assert_eq!(
            controller.status(streams[streams.len() - 1]),
            Some(StreamStatus::Completed)
        );
    }
}
