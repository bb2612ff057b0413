//! Inputs that drive a stream's state machine

use super::state::CancelReason;
use crate::error::TransportError;
use crate::event::AgentEvent;

/// Events that trigger stream state transitions
#[derive(Debug, Clone)]
pub enum StreamEvent {
    // Lifecycle events
    Requested,
    ResponseOpened,
    BodyEnded,

    // Wire events
    Agent(AgentEvent),
    /// A frame whose payload could not be parsed
    ProtocolError {
        message: String,
    },

    // Termination
    TransportFailed {
        error: TransportError,
    },
    Cancel {
        reason: CancelReason,
    },
}

impl StreamEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Requested => "requested",
            StreamEvent::ResponseOpened => "response_opened",
            StreamEvent::BodyEnded => "body_ended",
            StreamEvent::Agent(_) => "agent",
            StreamEvent::ProtocolError { .. } => "protocol_error",
            StreamEvent::TransportFailed { .. } => "transport_failed",
            StreamEvent::Cancel { .. } => "cancel",
        }
    }
}
