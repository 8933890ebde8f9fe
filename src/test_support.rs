// Scripted collaborators shared by unit tests

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::bridge::{BridgeReply, BridgeTransport};
use crate::errors::{Result, StepwiseError};
use crate::oracle::{
    InterpretRequest, Interpretation, Oracle, ValidationRequest, ValidationResponse,
};
use crate::otp::OneTimeCodeSource;

type Handler = dyn Fn(&str, &Value) -> Result<BridgeReply> + Send + Sync;

/// Bridge whose replies come from a closure; every POST is recorded
pub(crate) struct ScriptedBridge {
    healthy: bool,
    calls: Mutex<Vec<(String, Value)>>,
    handler: Box<Handler>,
}

impl ScriptedBridge {
    pub(crate) fn new(
        handler: impl Fn(&str, &Value) -> Result<BridgeReply> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            healthy: true,
            calls: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    /// Bridge that answers every endpoint with an empty success
    pub(crate) fn permissive() -> Arc<Self> {
        Self::new(|_, _| Ok(BridgeReply::ok(Value::Null)))
    }

    pub(crate) fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            healthy: false,
            calls: Mutex::new(Vec::new()),
            handler: Box::new(|_, _| Ok(BridgeReply::ok(Value::Null))),
        })
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn endpoints(&self) -> Vec<String> {
        self.calls().into_iter().map(|(endpoint, _)| endpoint).collect()
    }

    pub(crate) fn count(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|(e, _)| e == endpoint).count()
    }

    /// Every `code` sent to `/evaluate`, in order
    pub(crate) fn evaluated(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(e, _)| e == "evaluate")
            .filter_map(|(_, body)| code(&body).map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl BridgeTransport for ScriptedBridge {
    async fn health(&self, _timeout: Duration) -> Result<()> {
        if self.healthy {
            Ok(())
        } else {
            Err(StepwiseError::transport("health", "connection refused"))
        }
    }

    async fn post(&self, endpoint: &str, body: &Value, _timeout: Duration) -> Result<BridgeReply> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), body.clone()));
        (self.handler)(endpoint, body)
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

pub(crate) fn code(body: &Value) -> Option<&str> {
    body.get("code").and_then(Value::as_str)
}

/// Reply shaped like the bridge's evaluate output for a string result
pub(crate) fn eval_reply(value: &str) -> BridgeReply {
    BridgeReply::ok(json!([
        { "type": "text", "text": "Executed JavaScript:" },
        { "type": "text", "text": "..." },
        { "type": "text", "text": "Result:" },
        { "type": "text", "text": format!("\"{}\"", value) },
    ]))
}

pub(crate) fn image_reply(bytes: &[u8]) -> BridgeReply {
    use base64::Engine;
    BridgeReply::ok(json!([{
        "type": "image",
        "data": base64::engine::general_purpose::STANDARD.encode(bytes),
        "mimeType": "image/png",
    }]))
}

type InterpretFn = dyn Fn(&InterpretRequest) -> Result<Interpretation> + Send + Sync;
type ValidateFn = dyn Fn(&ValidationRequest) -> Result<ValidationResponse> + Send + Sync;

/// Oracle answering from closures; every request is recorded
pub(crate) struct ScriptedOracle {
    interpret: Box<InterpretFn>,
    validate: Box<ValidateFn>,
    interpreted: Mutex<Vec<InterpretRequest>>,
    validated: Mutex<Vec<ValidationRequest>>,
}

impl ScriptedOracle {
    pub(crate) fn new(
        interpret: impl Fn(&InterpretRequest) -> Result<Interpretation> + Send + Sync + 'static,
        validate: impl Fn(&ValidationRequest) -> Result<ValidationResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            interpret: Box::new(interpret),
            validate: Box::new(validate),
            interpreted: Mutex::new(Vec::new()),
            validated: Mutex::new(Vec::new()),
        })
    }

    /// Oracle that always answers with one action and accepts every step
    pub(crate) fn fixed(action: &str, parameters: Value) -> Arc<Self> {
        let action = action.to_string();
        Self::new(
            move |_| Ok(interpretation(&action, parameters.clone())),
            |_| Ok(verdict(true, "looks right")),
        )
    }

    pub(crate) fn interpreted(&self) -> Vec<InterpretRequest> {
        self.interpreted.lock().unwrap().clone()
    }

    pub(crate) fn validated(&self) -> Vec<ValidationRequest> {
        self.validated.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation> {
        self.interpreted.lock().unwrap().push(request.clone());
        (self.interpret)(request)
    }

    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResponse> {
        self.validated.lock().unwrap().push(request.clone());
        (self.validate)(request)
    }
}

pub(crate) fn interpretation(action: &str, parameters: Value) -> Interpretation {
    Interpretation {
        action: action.to_string(),
        parameters,
        validation: None,
        reasoning: Some(format!("step maps to {}", action)),
    }
}

pub(crate) fn verdict(valid: bool, reasoning: &str) -> ValidationResponse {
    ValidationResponse {
        valid,
        reasoning: Some(reasoning.to_string()),
        checks_needed: Vec::new(),
        evidence: None,
    }
}

/// One-time codes handed out in order; the last one repeats
pub(crate) struct SequenceCodes(Mutex<VecDeque<String>>);

impl SequenceCodes {
    pub(crate) fn new(codes: &[&str]) -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            codes.iter().map(|c| c.to_string()).collect(),
        )))
    }
}

impl OneTimeCodeSource for SequenceCodes {
    fn code_for(&self, _step: &str) -> Result<String> {
        let mut codes = self.0.lock().unwrap();
        let code = if codes.len() > 1 {
            codes.pop_front()
        } else {
            codes.front().cloned()
        };
        code.ok_or_else(|| StepwiseError::Other(anyhow::anyhow!("no codes left")))
    }
}
