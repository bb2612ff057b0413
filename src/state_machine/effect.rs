//! Effects produced by stream transitions

use super::state::CancelReason;
use crate::panel::ToolPanel;

/// Effects to be applied to the conversation after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append answer text to the stream's assistant message
    AppendDelta { text: String },

    /// Add a progress note to the thinking ledger
    RecordThinking { step: String },

    /// Drop the thinking ledger once real content arrives
    DismissThinking,

    /// Add a panel to the session's panel history
    AppendPanel { panel: ToolPanel },

    /// Replace the adjusted query shown to the user
    AdjustQuery { query: String },

    /// Surface a per-frame parse failure; the stream keeps going
    ReportProtocolError { message: String },

    /// Signal cancellation to the transport
    AbortTransport,

    /// Append the interruption marker to the assistant message
    MarkInterrupted { reason: CancelReason },

    /// Freeze the assistant message and release the active slot
    FreezeMessage,

    /// Tell the caller the stream failed
    NotifyFailure { message: String },
}

impl Effect {
    pub fn thinking(step: impl Into<String>) -> Self {
        Effect::RecordThinking { step: step.into() }
    }

    pub fn delta(text: impl Into<String>) -> Self {
        Effect::AppendDelta { text: text.into() }
    }
}
