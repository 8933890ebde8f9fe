//! Interpretation and verification oracle.
//!
//! The oracle turns a natural-language step into an action and later judges
//! whether the step achieved its expectation. It is an external service with a
//! fixed JSON contract; [`HttpOracle`] speaks that contract over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Result, StepwiseError};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterpretRequest {
    pub step_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_url: Option<String>,
    /// Selector remembered for this page and element, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Interpretation {
    pub action: String,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub validation: Option<Value>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub step_description: String,
    pub action: String,
    pub parameters: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<String>,
    /// Evidence gathered for checks the oracle asked for on a previous round
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Value>,
}

/// Evidence the oracle wants gathered before it decides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub tool: String,
    #[serde(default)]
    pub code_or_selector: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationResponse {
    /// Required; a response without an explicit boolean does not parse
    pub valid: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub checks_needed: Vec<Check>,
    #[serde(default)]
    pub evidence: Option<Value>,
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation>;

    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResponse>;
}

/// Oracle reached over HTTP at `<base>/interpret` and `<base>/validate`
#[derive(Debug, Clone)]
pub struct HttpOracle {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StepwiseError::Interpretation(format!("oracle request to {} failed: {}", url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StepwiseError::Interpretation(format!("oracle response unreadable: {}", e)))?;
        if !status.is_success() {
            return Err(StepwiseError::Interpretation(format!(
                "oracle {} answered {}: {}",
                path, status, text
            )));
        }
        debug!("Oracle {} response: {}", path, text);
        Ok(text)
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation> {
        let text = self.post("interpret", request).await?;
        parse_interpretation(&text)
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResponse> {
        let text = self.post("validate", request).await?;
        parse_validation(&text)
    }
}

/// Remove a surrounding markdown code fence, if any
pub fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

pub fn parse_interpretation(text: &str) -> Result<Interpretation> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        StepwiseError::Interpretation(format!("malformed interpretation: {}", e))
    })
}

pub fn parse_validation(text: &str) -> Result<ValidationResponse> {
    serde_json::from_str(strip_code_fences(text))
        .map_err(|e| StepwiseError::Interpretation(format!("malformed validation: {}", e)))
}

#[cfg(test)]
#[path = "oracle_test.rs"]
mod oracle_test;
