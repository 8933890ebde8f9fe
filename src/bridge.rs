//! Transport to the browser-automation bridge.
//!
//! The bridge is an HTTP+JSON service: every endpoint answers
//! `{success, content?, error?}`. [`BridgeTransport`] is the seam the
//! [`AutomationClient`](crate::automation::AutomationClient) dispatches through;
//! [`HttpBridge`] is the production implementation over one pooled `reqwest` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::errors::{Result, StepwiseError};

/// Envelope returned by every bridge endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeReply {
    #[serde(default)]
    pub success: bool,
    /// Usually a list of `{type, text}` items, but anything goes
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeReply {
    pub fn ok(content: Value) -> Self {
        Self {
            success: true,
            content,
            error: None,
        }
    }

    /// Successful reply carrying a single text item
    pub fn text(text: impl Into<String>) -> Self {
        Self::ok(serde_json::json!([{ "type": "text", "text": text.into() }]))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Value::Null,
            error: Some(message.into()),
        }
    }

    /// Content items as a slice regardless of how the bridge shaped them
    pub fn items(&self) -> &[Value] {
        match &self.content {
            Value::Array(items) => items,
            Value::Null => &[],
            other => std::slice::from_ref(other),
        }
    }

    /// Text of the first content item, or empty
    pub fn first_text(&self) -> String {
        self.items()
            .first()
            .map(item_text)
            .unwrap_or_default()
    }

    /// Turn `success: false` into a [`StepwiseError::RemoteAction`]
    pub fn into_result(self, endpoint: &str, default_message: &str) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(StepwiseError::remote(
                endpoint,
                self.error.unwrap_or_else(|| default_message.to_string()),
            ))
        }
    }
}

/// Text carried by a content item (`{"text": ..}` or a bare scalar)
pub fn item_text(item: &Value) -> String {
    match item {
        Value::Object(map) => map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Raw access to the bridge endpoints
#[async_trait]
pub trait BridgeTransport: Send + Sync {
    /// `GET /health`; fails when the bridge is unreachable or unhealthy
    async fn health(&self, timeout: Duration) -> Result<()>;

    /// `POST /<endpoint>` with a JSON body, bounded by `timeout`
    async fn post(&self, endpoint: &str, body: &Value, timeout: Duration) -> Result<BridgeReply>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Bridge reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpBridge {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBridge {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl BridgeTransport for HttpBridge {
    async fn health(&self, timeout: Duration) -> Result<()> {
        let response = self
            .client
            .get(self.url("health"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                StepwiseError::transport(
                    "health",
                    format!("Cannot reach bridge at {}. Is it running? Error: {}", self.base_url, e),
                )
            })?;

        if !response.status().is_success() {
            return Err(StepwiseError::transport(
                "health",
                format!("health check failed: {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn post(&self, endpoint: &str, body: &Value, timeout: Duration) -> Result<BridgeReply> {
        debug!("Calling bridge endpoint: {} with data: {}", endpoint, body);

        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Bridge call timed out after {:?}: {}", timeout, endpoint);
                    StepwiseError::transport(endpoint, format!("timed out after {:?}", timeout))
                } else {
                    StepwiseError::transport(endpoint, e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StepwiseError::transport(endpoint, e.to_string()))?;

        if !status.is_success() {
            error!(
                "Bridge call failed ({}): Status {}, Response: {}",
                endpoint, status, text
            );
            return Err(StepwiseError::transport(
                endpoint,
                format!("Status {}, Response: {}", status, text),
            ));
        }

        parse_reply(endpoint, &text)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Parse a bridge response body; an empty body is an unsuccessful empty reply
pub fn parse_reply(endpoint: &str, text: &str) -> Result<BridgeReply> {
    if text.trim().is_empty() {
        return Ok(BridgeReply::default());
    }
    serde_json::from_str(text).map_err(|e| {
        StepwiseError::transport(
            endpoint,
            format!("Failed to parse bridge response: {}. Response: {}", e, text),
        )
    })
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;
