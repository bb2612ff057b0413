//! Pure state transition function
//!
//! Given the same state and input it always yields the same new state and
//! effects. No I/O happens here; the controller applies the effects.

use super::{CancelReason, Effect, StreamEvent, StreamState};
use crate::event::AgentEvent;
use crate::panel::normalize_tool_result;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: StreamState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: StreamState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &StreamState,
    event: StreamEvent,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Terminal states absorb everything
        (s, _) if s.is_terminal() => Ok(TransitionResult::new(s.clone())),

        // ============================================================
        // Lifecycle
        // ============================================================
        (StreamState::Idle, StreamEvent::Requested) => {
            Ok(TransitionResult::new(StreamState::Started))
        }

        (StreamState::Started, StreamEvent::ResponseOpened) => {
            Ok(TransitionResult::new(StreamState::Receiving {
                events: 0,
                saw_final: false,
            }))
        }

        (StreamState::Started | StreamState::Receiving { .. }, StreamEvent::BodyEnded) => {
            Ok(TransitionResult::new(StreamState::Completed)
                .with_effect(Effect::DismissThinking)
                .with_effect(Effect::FreezeMessage))
        }

        // ============================================================
        // Wire events
        // ============================================================
        (StreamState::Started, StreamEvent::Agent(agent_event)) => {
            Ok(receive(0, false, agent_event))
        }

        (StreamState::Receiving { events, saw_final }, StreamEvent::Agent(agent_event)) => {
            Ok(receive(*events, *saw_final, agent_event))
        }

        // A bad frame leaves the stream running
        (
            StreamState::Started | StreamState::Receiving { .. },
            StreamEvent::ProtocolError { message },
        ) => {
            let next = match state {
                StreamState::Receiving { .. } => state.clone(),
                _ => StreamState::Receiving {
                    events: 0,
                    saw_final: false,
                },
            };
            Ok(TransitionResult::new(next).with_effect(Effect::ReportProtocolError { message }))
        }

        // ============================================================
        // Termination
        // ============================================================
        (
            StreamState::Started | StreamState::Receiving { .. },
            StreamEvent::TransportFailed { error },
        ) => Ok(TransitionResult::new(StreamState::Failed {
            message: error.message.clone(),
        })
        .with_effect(Effect::DismissThinking)
        .with_effect(Effect::FreezeMessage)
        .with_effect(Effect::NotifyFailure {
            message: error.message,
        })),

        (StreamState::Idle, StreamEvent::Cancel { reason }) => {
            Ok(TransitionResult::new(StreamState::Cancelled { reason }))
        }

        (StreamState::Started | StreamState::Receiving { .. }, StreamEvent::Cancel { reason }) => {
            Ok(cancelled(reason))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{} while {}",
            event.name(),
            state_name(state)
        ))),
    }
}

fn receive(events: u32, saw_final: bool, agent_event: AgentEvent) -> TransitionResult {
    let is_final = matches!(agent_event, AgentEvent::Final { .. });
    TransitionResult::new(StreamState::Receiving {
        events: events.saturating_add(1),
        saw_final: saw_final || is_final,
    })
    .with_effects(effects_for(agent_event))
}

fn cancelled(reason: CancelReason) -> TransitionResult {
    TransitionResult::new(StreamState::Cancelled { reason })
        .with_effect(Effect::AbortTransport)
        .with_effect(Effect::DismissThinking)
        .with_effect(Effect::MarkInterrupted { reason })
        .with_effect(Effect::FreezeMessage)
}

/// Effects of a single agent event, independent of stream state
pub fn effects_for(agent_event: AgentEvent) -> Vec<Effect> {
    match agent_event {
        AgentEvent::ToolCall { name, .. } => vec![Effect::thinking(format!("Calling tool: {name}"))],
        AgentEvent::ToolResult { name, result } => {
            let mut effects = vec![Effect::thinking(format!("Received result from: {name}"))];
            if let Some(panel) = normalize_tool_result(&name, &result) {
                effects.push(Effect::AppendPanel { panel });
            }
            effects
        }
        AgentEvent::QueryUpdate { query } => vec![Effect::AdjustQuery { query }],
        AgentEvent::Final { text } => vec![Effect::delta(text), Effect::DismissThinking],
    }
}

fn state_name(state: &StreamState) -> &'static str {
    match state {
        StreamState::Idle => "idle",
        StreamState::Started => "started",
        StreamState::Receiving { .. } => "receiving",
        StreamState::Completed => "completed",
        StreamState::Cancelled { .. } => "cancelled",
        StreamState::Failed { .. } => "failed",
    }
}
