//! Agent events carried by the chat stream

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

const KNOWN_TYPES: &[&str] = &["tool_call", "tool_result", "query_update", "final"];

/// One decoded unit of agent progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolCall {
        name: String,
        #[serde(default)]
        args: Value,
    },
    ToolResult {
        name: String,
        #[serde(default)]
        result: Value,
    },
    QueryUpdate {
        #[serde(default, deserialize_with = "null_as_empty")]
        query: String,
    },
    /// Fragment of the answer text
    Final {
        #[serde(default, deserialize_with = "null_as_empty")]
        text: String,
    },
}

impl AgentEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::QueryUpdate { .. } => "query_update",
            AgentEvent::Final { .. } => "final",
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why a single frame payload could not become an event
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("Event has no type discriminator")]
    MissingType,
    #[error("Unknown event type: {0}")]
    UnknownType(String),
    #[error("Malformed {kind} event: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse one payload line into an event
pub fn parse_event(payload: &str) -> Result<AgentEvent, ParseError> {
    let value: Value = serde_json::from_str(payload).map_err(ParseError::InvalidJson)?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingType)?;
    if !KNOWN_TYPES.contains(&kind) {
        return Err(ParseError::UnknownType(kind.to_string()));
    }
    let kind = kind.to_string();

    serde_json::from_value(value).map_err(|source| ParseError::Malformed { kind, source })
}
