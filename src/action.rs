use serde_json::{Map, Value, json};
use std::fmt;

use crate::errors::{Result, StepwiseError};

/// A browser action resolved for one step.
///
/// Built from the oracle's `{action, parameters}` pair, or from the selector
/// cache. Parsing rejects missing parameters before anything reaches the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate { url: String },
    Click { selector: String },
    Fill { selector: String, text: String },
    WaitFor { selector: String, timeout_ms: Option<u64> },
    GetText { selector: String },
    /// Nothing to do besides the step screenshot
    Screenshot,
}

impl Action {
    pub fn parse(action: &str, parameters: &Value) -> Result<Self> {
        let action = action.trim().to_lowercase();
        match action.as_str() {
            "navigate" => Ok(Action::Navigate {
                url: required(&action, parameters, "url")?,
            }),
            "click" => Ok(Action::Click {
                selector: required(&action, parameters, "selector")?,
            }),
            "fill" => Ok(Action::Fill {
                selector: required(&action, parameters, "selector")?,
                text: parameters
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| missing(&action, "text"))?,
            }),
            "wait_for" => Ok(Action::WaitFor {
                selector: required(&action, parameters, "selector")?,
                timeout_ms: parameters.get("timeout").and_then(Value::as_u64),
            }),
            "get_text" => Ok(Action::GetText {
                selector: required(&action, parameters, "selector")?,
            }),
            "screenshot" => Ok(Action::Screenshot),
            "" => Err(StepwiseError::Interpretation(
                "interpretation has no action".to_string(),
            )),
            other => Err(StepwiseError::Interpretation(format!(
                "unknown action '{}'",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Fill { .. } => "fill",
            Action::WaitFor { .. } => "wait_for",
            Action::GetText { .. } => "get_text",
            Action::Screenshot => "screenshot",
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            Action::Click { selector }
            | Action::Fill { selector, .. }
            | Action::WaitFor { selector, .. }
            | Action::GetText { selector } => Some(selector),
            Action::Navigate { .. } | Action::Screenshot => None,
        }
    }

    /// Parameters as recorded in step results and sent for verification
    pub fn parameters(&self) -> Value {
        match self {
            Action::Navigate { url } => json!({ "url": url }),
            Action::Click { selector } | Action::GetText { selector } => {
                json!({ "selector": selector })
            }
            Action::Fill { selector, text } => json!({ "selector": selector, "text": text }),
            Action::WaitFor {
                selector,
                timeout_ms,
            } => {
                let mut map = Map::new();
                map.insert("selector".to_string(), json!(selector));
                if let Some(timeout) = timeout_ms {
                    map.insert("timeout".to_string(), json!(timeout));
                }
                Value::Object(map)
            }
            Action::Screenshot => json!({}),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Navigate { url } => write!(f, "navigate {}", url),
            Action::Fill { selector, .. } => write!(f, "fill {}", selector),
            Action::Screenshot => write!(f, "screenshot"),
            other => write!(f, "{} {}", other.name(), other.selector().unwrap_or_default()),
        }
    }
}

fn missing(action: &str, key: &str) -> StepwiseError {
    StepwiseError::Interpretation(format!("{} action requires '{}' parameter", action, key))
}

fn required(action: &str, parameters: &Value, key: &str) -> Result<String> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| missing(action, key))
}

#[cfg(test)]
#[path = "action_test.rs"]
mod action_test;
