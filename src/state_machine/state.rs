//! Stream state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one request/response exchange within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// Why a stream was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The caller asked to stop
    Requested,
    /// A newer stream on the same session took over
    Superseded,
}

impl CancelReason {
    /// Line appended to the interrupted assistant message
    pub fn marker(self) -> &'static str {
        match self {
            CancelReason::Requested => "\n[stopped early]",
            CancelReason::Superseded => "\n[stopped early: a new question was asked]",
        }
    }
}

/// Stream state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamState {
    /// Created, request not yet issued
    #[default]
    Idle,

    /// Request issued, waiting for response headers
    Started,

    /// Response body is being read
    Receiving {
        /// Events applied so far
        events: u32,
        saw_final: bool,
    },

    /// Body ended normally
    Completed,

    Cancelled { reason: CancelReason },

    /// Transport failure; no retry is attempted
    Failed { message: String },
}

impl StreamState {
    /// Terminal states absorb all further input
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Cancelled { .. } | StreamState::Failed { .. }
        )
    }

    pub fn status(&self) -> StreamStatus {
        match self {
            StreamState::Idle | StreamState::Started | StreamState::Receiving { .. } => {
                StreamStatus::Running
            }
            StreamState::Completed => StreamStatus::Completed,
            StreamState::Cancelled { .. } => StreamStatus::Aborted,
            StreamState::Failed { .. } => StreamStatus::Failed,
        }
    }
}

/// Coarse lifecycle status of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Running,
    Completed,
    Aborted,
    Failed,
}
