//! Conversation transcript
//!
//! Holds the ordered messages of a session, the tool panel history, the
//! transient thinking ledger and the adjusted query. Only the assistant
//! message of the active stream can change, and only by appending.

use crate::panel::ToolPanel;
use crate::state_machine::{CancelReason, StreamId};
use crate::transport::ChatMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Entry in the conversation transcript
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: String,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        match self.role {
            Role::User => ChatMessage::user(&self.content),
            Role::Assistant => ChatMessage::assistant(&self.content),
        }
    }
}

/// Assistant message currently being written by a stream
#[derive(Debug, Clone)]
struct ActiveReply {
    stream: StreamId,
    message_id: String,
}

/// Progress notes shown while an answer has no text yet
#[derive(Debug, Clone, Default)]
struct ThinkingLedger {
    message_id: Option<String>,
    steps: Vec<String>,
}

/// Session-scoped conversation state
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    panels: Vec<ToolPanel>,
    thinking: ThinkingLedger,
    adjusted_query: Option<String>,
    active: Option<ActiveReply>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a question; user content never changes afterwards
    pub fn push_user(&mut self, text: impl Into<String>) -> &Message {
        let index = self.messages.len();
        self.messages.push(Message::new(Role::User, text));
        &self.messages[index]
    }

    /// Create the empty assistant placeholder for `stream` and make it active.
    ///
    /// Any previously active reply is frozen as is; the thinking ledger is
    /// reset and attached to the new placeholder.
    pub fn begin(&mut self, stream: StreamId) -> String {
        let message = Message::new(Role::Assistant, "");
        let message_id = message.id.clone();
        self.messages.push(message);
        self.active = Some(ActiveReply {
            stream,
            message_id: message_id.clone(),
        });
        self.thinking = ThinkingLedger {
            message_id: Some(message_id.clone()),
            steps: Vec::new(),
        };
        message_id
    }

    /// Append answer text; returns false when `message_id` is not the active reply
    pub fn apply_delta(&mut self, message_id: &str, text: &str) -> bool {
        if !self.is_active_message(message_id) {
            return false;
        }
        let Some(message) = self.messages.iter_mut().rev().find(|m| m.id == message_id) else {
            return false;
        };
        message.content.push_str(text);
        if !message.content.trim().is_empty() {
            self.thinking = ThinkingLedger::default();
        }
        true
    }

    /// Append the interruption marker for `reason` to the active reply
    pub fn interrupt(&mut self, message_id: &str, reason: CancelReason) -> bool {
        self.apply_delta(message_id, reason.marker())
    }

    /// Freeze the reply of `stream`; returns its message id if it was active
    pub fn finish(&mut self, stream: StreamId) -> Option<String> {
        if self.active.as_ref().is_some_and(|a| a.stream == stream) {
            return self.active.take().map(|a| a.message_id);
        }
        None
    }

    /// Add a progress note; ignored once the ledger has been dismissed
    pub fn record_thinking(&mut self, step: impl Into<String>) -> bool {
        if self.thinking.message_id.is_none() {
            return false;
        }
        self.thinking.steps.push(step.into());
        true
    }

    /// Discard the thinking ledger; returns false if it was already gone
    pub fn dismiss_thinking(&mut self) -> bool {
        let had_ledger = self.thinking.message_id.is_some();
        self.thinking = ThinkingLedger::default();
        had_ledger
    }

    pub fn append_panel(&mut self, panel: ToolPanel) {
        self.panels.push(panel);
    }

    pub fn set_adjusted_query(&mut self, query: impl Into<String>) {
        self.adjusted_query = Some(query.into());
    }

    /// Forget everything; used when a new session starts
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn panels(&self) -> &[ToolPanel] {
        &self.panels
    }

    pub fn adjusted_query(&self) -> Option<&str> {
        self.adjusted_query.as_deref()
    }

    pub fn active_message_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.message_id.as_str())
    }

    /// Thinking steps to display, with the message they belong to.
    ///
    /// Visible only while that message still has no non-blank content.
    pub fn visible_thinking(&self) -> Option<(&str, &[String])> {
        let message_id = self.thinking.message_id.as_deref()?;
        let message = self.message(message_id)?;
        if !message.content.trim().is_empty() {
            return None;
        }
        Some((message_id, &self.thinking.steps))
    }

    /// Role/content history for the next request
    pub fn history(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(Message::to_chat_message).collect()
    }

    fn is_active_message(&self, message_id: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.message_id == message_id)
    }
}
