//! Session identifiers
//!
//! Durable persistence of the identifier is left to the embedding
//! application; this module only needs "read current" and "create new".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Opaque identifier of one logical conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Source of the current session identifier
pub trait SessionStore: Send + Sync {
    /// Identifier stored so far, if any
    fn current(&self) -> Option<SessionId>;

    /// Replace the stored identifier with a fresh one
    fn create_new(&self) -> SessionId;

    fn current_or_create(&self) -> SessionId {
        self.current().unwrap_or_else(|| self.create_new())
    }
}

/// Process-lifetime session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    current: Mutex<Option<SessionId>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(id: SessionId) -> Self {
        Self {
            current: Mutex::new(Some(id)),
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn current(&self) -> Option<SessionId> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn create_new(&self) -> SessionId {
        let id = SessionId::generate();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(id.clone());
        tracing::debug!(session_id = %id, "Created new session");
        id
    }
}
