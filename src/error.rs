//! Transport error types

use thiserror::Error;

/// Transport error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Network, message)
    }

    pub fn status(code: u16) -> Self {
        Self::new(TransportErrorKind::Status(code), format!("Bad response: {code}"))
    }

    pub fn missing_body() -> Self {
        Self::new(TransportErrorKind::MissingBody, "Response has no body")
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Body, message)
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Client, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if let Some(status) = error.status() {
            TransportErrorKind::Status(status.as_u16())
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else if error.is_builder() {
            TransportErrorKind::Client
        } else {
            TransportErrorKind::Network
        };
        Self::new(kind, error.to_string())
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection refused, reset, timed out
    Network,
    /// Server answered with a non-success status
    Status(u16),
    /// Response arrived without a readable body
    MissingBody,
    /// Body broke off mid-stream
    Body,
    /// HTTP client could not be built or the request was malformed
    Client,
}

impl TransportErrorKind {
    /// Whether the failure happened before any response bytes were read
    pub fn is_before_response(&self) -> bool {
        matches!(self, Self::Network | Self::Client)
    }
}
