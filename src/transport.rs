//! Agent chat transport
//!
//! The HTTP endpoint that produces the event stream is an external
//! collaborator; this module defines the request shapes and the trait the
//! controller drives, so tests can substitute a scripted transport.

mod http;

pub use http::{parse_sample_queries, HttpTransport};

use crate::error::TransportError;
use async_trait::async_trait;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

/// Raw body chunks as delivered by the network
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Role of a message sent upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role/content pair of the request history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of the streaming chat request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentChatRequest {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Response headers plus the still-unread body
pub struct StreamResponse {
    pub status: u16,
    pub body: Option<BodyStream>,
}

impl StreamResponse {
    pub fn new(status: u16, body: BodyStream) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Readiness reported by the liveness endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub ok: bool,
    pub message: Option<String>,
    pub gpt_enabled: bool,
}

impl HealthStatus {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
            gpt_enabled: false,
        }
    }
}

/// Suggested question offered by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleQuery {
    pub id: String,
    pub text: String,
}

/// Client side of the agent chat endpoint
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Issue the request and return once response headers are in
    async fn open_stream(&self, request: &AgentChatRequest)
        -> Result<StreamResponse, TransportError>;

    /// Query the liveness endpoint; failures are folded into the status
    async fn health(&self) -> HealthStatus;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Arc<T> {
    async fn open_stream(
        &self,
        request: &AgentChatRequest,
    ) -> Result<StreamResponse, TransportError> {
        (**self).open_stream(request).await
    }

    async fn health(&self) -> HealthStatus {
        (**self).health().await
    }
}
