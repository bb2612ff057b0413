//! Analyst chat client
//!
//! Client-side handling of the analytics agent's streamed answers: frame
//! decoding, event parsing, tool result normalization, and a controller
//! that folds each stream into a session-scoped conversation.

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod panel;
pub mod session;
pub mod sse;
pub mod state_machine;
pub mod system_prompt;
pub mod transcript;
pub mod transport;

pub use config::ClientConfig;
pub use controller::{ConversationUpdate, StreamController};
pub use error::{TransportError, TransportErrorKind};
pub use event::{parse_event, AgentEvent, ParseError};
pub use panel::{normalize_tool_result, Table, ToolKind, ToolPanel};
pub use session::{InMemorySessionStore, SessionId, SessionStore};
pub use state_machine::{CancelReason, StreamId, StreamState, StreamStatus};
pub use transcript::{Conversation, Message, Role};
pub use transport::{ChatTransport, HttpTransport};
