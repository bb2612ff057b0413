//! Session stream controller
//!
//! Owns the conversation of one session and at most one active stream.
//! Network reads happen on spawned tasks that only send events back over a
//! channel; the controller applies them one at a time, so it is the single
//! writer of conversation state.

#[cfg(test)]
mod testing;

use crate::event::parse_event;
use crate::panel::ToolPanel;
use crate::session::SessionId;
use crate::sse::{pump_payloads, PumpOutcome};
use crate::state_machine::{
    transition, CancelReason, Effect, StreamEvent, StreamId, StreamState, StreamStatus,
};
use crate::system_prompt::{greeting_messages, upload_context_preface, DatasetSummary};
use crate::transcript::{Conversation, Role};
use crate::transport::{AgentChatRequest, ChatMessage, ChatTransport};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

const UPDATE_CHANNEL_CAPACITY: usize = 128;
/// Outcomes of pruned streams kept for `status`
const FINISHED_HISTORY: usize = 16;

/// Observable change to the conversation, for presentation layers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationUpdate {
    MessageAppended {
        message_id: String,
        role: Role,
    },
    ContentAppended {
        message_id: String,
        text: String,
    },
    ThinkingStep {
        message_id: String,
        step: String,
    },
    ThinkingDismissed,
    PanelAdded {
        panel: ToolPanel,
    },
    QueryAdjusted {
        query: String,
    },
    ProtocolError {
        stream: StreamId,
        message: String,
    },
    StreamFinished {
        stream: StreamId,
        status: StreamStatus,
    },
    StreamFailed {
        stream: StreamId,
        message: String,
    },
    SessionReset {
        session_id: SessionId,
    },
}

#[derive(Debug)]
struct StreamRecord {
    state: StreamState,
    cancel: CancellationToken,
    message_id: String,
}

/// Drives the streams of one session against a transport
pub struct StreamController<T>
where
    T: ChatTransport + 'static,
{
    session_id: SessionId,
    transport: Arc<T>,
    conversation: Conversation,
    /// Live streams only; records are pruned once they finish
    streams: HashMap<StreamId, StreamRecord>,
    finished: VecDeque<(StreamId, StreamStatus)>,
    active: Option<StreamId>,
    next_stream: u64,
    event_tx: mpsc::UnboundedSender<(StreamId, StreamEvent)>,
    event_rx: mpsc::UnboundedReceiver<(StreamId, StreamEvent)>,
    updates_tx: broadcast::Sender<ConversationUpdate>,
    datasets: Vec<DatasetSummary>,
    /// Upload preface already sent for the current datasets
    injected_upload_context: bool,
    has_welcomed: bool,
}

impl<T> StreamController<T>
where
    T: ChatTransport + 'static,
{
    pub fn new(session_id: SessionId, transport: T) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            session_id,
            transport: Arc::new(transport),
            conversation: Conversation::new(),
            streams: HashMap::new(),
            finished: VecDeque::with_capacity(FINISHED_HISTORY),
            active: None,
            next_stream: 1,
            event_tx,
            event_rx,
            updates_tx,
            datasets: Vec::new(),
            injected_upload_context: false,
            has_welcomed: false,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn active_stream(&self) -> Option<StreamId> {
        self.active
    }

    /// State of a live stream; finished streams are no longer tracked
    pub fn state(&self, stream: StreamId) -> Option<&StreamState> {
        self.streams.get(&stream).map(|r| &r.state)
    }

    /// Status of a live stream or one of the most recently finished ones
    pub fn status(&self, stream: StreamId) -> Option<StreamStatus> {
        self.state(stream).map(StreamState::status).or_else(|| {
            self.finished
                .iter()
                .find(|(id, _)| *id == stream)
                .map(|(_, status)| *status)
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.updates_tx.subscribe()
    }

    pub fn updates(&self) -> BroadcastStream<ConversationUpdate> {
        BroadcastStream::new(self.subscribe())
    }

    /// Register uploaded datasets; the next question carries a fresh preface
    pub fn set_datasets(&mut self, datasets: Vec<DatasetSummary>) {
        self.datasets = datasets;
        self.injected_upload_context = false;
    }

    /// Ask a question, superseding any active stream.
    ///
    /// The request carries the full transcript, preceded by the upload
    /// preface the first time datasets are in play.
    pub fn submit(&mut self, question: impl Into<String>) -> StreamId {
        self.supersede_active();

        let message_id = self.conversation.push_user(question).id().to_string();
        self.notify(ConversationUpdate::MessageAppended {
            message_id,
            role: Role::User,
        });

        let mut messages = Vec::new();
        if !self.injected_upload_context {
            if let Some(preface) = upload_context_preface(&self.datasets) {
                messages.push(preface);
                self.injected_upload_context = true;
            }
        }
        messages.extend(self.conversation.history());
        self.start_stream(messages)
    }

    /// Start the opening greeting, once per session and only on an empty transcript
    pub fn greet(&mut self) -> Option<StreamId> {
        if self.has_welcomed || !self.conversation.messages().is_empty() {
            return None;
        }
        self.has_welcomed = true;
        Some(self.start_stream(greeting_messages(&self.datasets)))
    }

    /// Open a stream for `messages` with a fresh assistant placeholder
    pub fn start_stream(&mut self, messages: Vec<ChatMessage>) -> StreamId {
        self.supersede_active();

        let stream = StreamId(self.next_stream);
        self.next_stream += 1;

        let message_id = self.conversation.begin(stream);
        self.notify(ConversationUpdate::MessageAppended {
            message_id: message_id.clone(),
            role: Role::Assistant,
        });

        let cancel = CancellationToken::new();
        self.streams.insert(
            stream,
            StreamRecord {
                state: StreamState::Idle,
                cancel: cancel.clone(),
                message_id,
            },
        );
        self.active = Some(stream);
        self.apply(stream, StreamEvent::Requested);

        let request = AgentChatRequest {
            session_id: self.session_id.to_string(),
            messages,
        };
        tracing::info!(
            stream = %stream,
            session_id = %self.session_id,
            messages = request.messages.len(),
            "Starting stream"
        );
        self.spawn_reader(stream, request, cancel);
        stream
    }

    /// Cancel `stream`; cancelling a finished or unknown stream does nothing
    pub fn cancel(&mut self, stream: StreamId) {
        self.apply(
            stream,
            StreamEvent::Cancel {
                reason: CancelReason::Requested,
            },
        );
    }

    /// Cancel the active stream, returning it if there was one
    pub fn cancel_active(&mut self) -> Option<StreamId> {
        let stream = self.active?;
        self.cancel(stream);
        Some(stream)
    }

    /// Start over with a new session id and an empty conversation
    pub fn reset(&mut self, session_id: SessionId) {
        self.cancel_active();
        self.streams.clear();
        self.finished.clear();
        self.active = None;
        self.conversation.reset();
        self.injected_upload_context = false;
        self.has_welcomed = false;
        self.session_id = session_id.clone();
        tracing::info!(session_id = %session_id, "Session reset");
        self.notify(ConversationUpdate::SessionReset { session_id });
    }

    /// Wait for the next stream event and apply it
    pub async fn process_next(&mut self) -> bool {
        let Some((stream, event)) = self.event_rx.recv().await else {
            return false;
        };
        self.apply(stream, event);
        true
    }

    /// Process events until `stream` reaches a terminal state
    pub async fn run_until_settled(&mut self, stream: StreamId) -> Option<StreamStatus> {
        while self.state(stream).is_some_and(|s| !s.is_terminal()) {
            if !self.process_next().await {
                break;
            }
        }
        self.status(stream)
    }

    fn supersede_active(&mut self) {
        if let Some(previous) = self.active.take() {
            tracing::info!(stream = %previous, "Superseding active stream");
            self.apply(
                previous,
                StreamEvent::Cancel {
                    reason: CancelReason::Superseded,
                },
            );
        }
    }

    fn spawn_reader(&self, stream: StreamId, request: AgentChatRequest, cancel: CancellationToken) {
        let transport = Arc::clone(&self.transport);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let send = |event: StreamEvent| {
                let _ = event_tx.send((stream, event));
            };

            let response = tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    tracing::debug!(stream = %stream, "Cancelled before response");
                    return;
                }

                result = transport.open_stream(&request) => result,
            };

            let response = match response {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        stream = %stream,
                        error = %error,
                        before_response = error.kind.is_before_response(),
                        "Stream request failed"
                    );
                    send(StreamEvent::TransportFailed { error });
                    return;
                }
            };
            tracing::debug!(stream = %stream, status = response.status, "Response opened");
            send(StreamEvent::ResponseOpened);

            let outcome = pump_payloads(response, &cancel, |payload| {
                let event = match parse_event(&payload) {
                    Ok(event) => StreamEvent::Agent(event),
                    Err(e) => StreamEvent::ProtocolError {
                        message: e.to_string(),
                    },
                };
                send(event);
            })
            .await;

            match outcome {
                Ok(PumpOutcome::Completed) => send(StreamEvent::BodyEnded),
                Ok(PumpOutcome::Cancelled) => {
                    tracing::debug!(stream = %stream, "Reader stopped after cancellation");
                }
                Err(error) => {
                    tracing::warn!(stream = %stream, error = %error, "Stream transport failed");
                    send(StreamEvent::TransportFailed { error });
                }
            }
        });
    }

    /// Run one event through the stream's state machine and apply the effects
    fn apply(&mut self, stream: StreamId, event: StreamEvent) {
        let Some(record) = self.streams.get(&stream) else {
            if self.finished.iter().any(|(id, _)| *id == stream) {
                tracing::trace!(stream = %stream, event = event.name(), "Ignoring event for finished stream");
            } else {
                tracing::debug!(stream = %stream, event = event.name(), "Event for unknown stream");
            }
            return;
        };
        let old_state = record.state.clone();
        if old_state.is_terminal() {
            tracing::trace!(stream = %stream, event = event.name(), "Ignoring event for finished stream");
            return;
        }

        let result = match transition(&old_state, event) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(stream = %stream, error = %e, "Rejected stream event");
                return;
            }
        };

        let new_state = result.new_state;
        if let Some(record) = self.streams.get_mut(&stream) {
            record.state = new_state.clone();
        }

        for effect in result.effects {
            self.execute_effect(stream, effect);
        }

        if new_state.is_terminal() {
            if new_state == StreamState::Completed
                && !matches!(old_state, StreamState::Receiving { saw_final: true, .. })
            {
                tracing::warn!(stream = %stream, "Stream ended without a final event");
            }
            tracing::info!(stream = %stream, status = ?new_state.status(), "Stream finished");
            self.notify(ConversationUpdate::StreamFinished {
                stream,
                status: new_state.status(),
            });
            self.prune(stream, new_state.status());
        }
    }

    fn prune(&mut self, stream: StreamId, status: StreamStatus) {
        self.streams.remove(&stream);
        if self.finished.len() == FINISHED_HISTORY {
            self.finished.pop_front();
        }
        self.finished.push_back((stream, status));
    }

    fn execute_effect(&mut self, stream: StreamId, effect: Effect) {
        let Some(record) = self.streams.get(&stream) else {
            return;
        };
        let message_id = record.message_id.clone();
        let cancel = record.cancel.clone();
        let owns_ledger = self.conversation.active_message_id() == Some(message_id.as_str());

        match effect {
            Effect::AppendDelta { text } => {
                let had_thinking = self.conversation.visible_thinking().is_some();
                if self.conversation.apply_delta(&message_id, &text) {
                    self.notify(ConversationUpdate::ContentAppended { message_id, text });
                    if had_thinking && self.conversation.visible_thinking().is_none() {
                        self.notify(ConversationUpdate::ThinkingDismissed);
                    }
                }
            }

            Effect::RecordThinking { step } => {
                if owns_ledger && self.conversation.record_thinking(step.clone()) {
                    self.notify(ConversationUpdate::ThinkingStep { message_id, step });
                }
            }

            Effect::DismissThinking => {
                if owns_ledger && self.conversation.dismiss_thinking() {
                    self.notify(ConversationUpdate::ThinkingDismissed);
                }
            }

            Effect::AppendPanel { panel } => {
                tracing::debug!(stream = %stream, kind = ?panel.kind(), "Panel added");
                self.conversation.append_panel(panel.clone());
                self.notify(ConversationUpdate::PanelAdded { panel });
            }

            Effect::AdjustQuery { query } => {
                self.conversation.set_adjusted_query(query.clone());
                self.notify(ConversationUpdate::QueryAdjusted { query });
            }

            Effect::ReportProtocolError { message } => {
                tracing::warn!(stream = %stream, error = %message, "Skipping malformed frame");
                self.notify(ConversationUpdate::ProtocolError { stream, message });
            }

            Effect::AbortTransport => cancel.cancel(),

            Effect::MarkInterrupted { reason } => {
                if self.conversation.interrupt(&message_id, reason) {
                    self.notify(ConversationUpdate::ContentAppended {
                        message_id,
                        text: reason.marker().to_string(),
                    });
                }
            }

            Effect::FreezeMessage => {
                self.conversation.finish(stream);
                if self.active == Some(stream) {
                    self.active = None;
                }
            }

            Effect::NotifyFailure { message } => {
                tracing::error!(stream = %stream, error = %message, "Stream failed");
                self.notify(ConversationUpdate::StreamFailed { stream, message });
            }
        }
    }

    fn notify(&self, update: ConversationUpdate) {
        // No subscribers is fine
        let _ = self.updates_tx.send(update);
    }
}
