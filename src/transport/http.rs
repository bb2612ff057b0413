//! reqwest-backed transport

use super::{AgentChatRequest, BodyStream, ChatTransport, HealthStatus, SampleQuery, StreamResponse};
use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

/// HTTP transport talking to the analytics agent server
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

/// `ok` is optional: the analytics server reports `status` instead
#[derive(Debug, Deserialize)]
struct HealthPayload {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    gpt_enabled: Option<bool>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        // No total timeout: the response body stays open for the whole answer
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::client(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Fetch suggested questions; any failure yields an empty list
    pub async fn sample_queries(&self) -> Vec<SampleQuery> {
        let response = match self.client.get(self.endpoint("sample-queries")).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::debug!(status = %r.status(), "Sample queries unavailable");
                return Vec::new();
            }
            Err(e) => {
                tracing::debug!(error = %e, "Sample queries request failed");
                return Vec::new();
            }
        };

        match response.json::<Value>().await {
            Ok(value) => parse_sample_queries(&value),
            Err(_) => Vec::new(),
        }
    }
}

/// Accept either `[{id, text}]` or a plain list of strings
pub fn parse_sample_queries(value: &Value) -> Vec<SampleQuery> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    if items.first().is_some_and(Value::is_string) {
        return items
            .iter()
            .enumerate()
            .filter_map(|(idx, item)| {
                item.as_str().map(|text| SampleQuery {
                    id: idx.to_string(),
                    text: text.to_string(),
                })
            })
            .collect();
    }

    items
        .iter()
        .filter_map(|item| serde_json::from_value::<SampleQuery>(item.clone()).ok())
        .collect()
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(
        &self,
        request: &AgentChatRequest,
    ) -> Result<StreamResponse, TransportError> {
        let response = self
            .client
            .post(self.endpoint("agent-chat"))
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        tracing::debug!(status, session_id = %request.session_id, "Agent chat response opened");

        let body: BodyStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(TransportError::from)),
        );
        Ok(StreamResponse::new(status, body))
    }

    async fn health(&self) -> HealthStatus {
        let response = match self.client.get(self.endpoint("health")).send().await {
            Ok(r) => r,
            Err(e) => return HealthStatus::unavailable(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return HealthStatus::unavailable(format!("HTTP {}", status.as_u16()));
        }

        match response.json::<HealthPayload>().await {
            Ok(payload) => health_from_payload(payload),
            Err(e) => HealthStatus::unavailable(format!("Invalid health payload: {e}")),
        }
    }
}

/// A 2xx health response counts as healthy unless it says otherwise
fn health_from_payload(payload: HealthPayload) -> HealthStatus {
    HealthStatus {
        ok: payload.ok.unwrap_or(true),
        message: payload.message,
        gpt_enabled: payload.gpt_enabled.unwrap_or(false),
    }
}
