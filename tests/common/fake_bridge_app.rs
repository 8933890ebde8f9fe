// Fake automation bridge shared between integration tests and the standalone binary.
//
// Serves the bridge's HTTP+JSON surface over an in-memory login page. Page
// scripts cannot run here, so `evaluate` answers the handful of expressions
// the client sends by recognising them.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use base64::Engine;
use regex::Regex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Selectors present on the fake page
pub const ELEMENTS: &[&str] = &["#username", "#password", "#otp", "button[type=submit]", "h1"];

/// Everything the fake browser has been asked to do
#[derive(Debug, Default, Clone)]
pub struct Page {
    pub connected: bool,
    pub url: Option<String>,
    pub fields: HashMap<String, String>,
    pub clicks: Vec<String>,
    pub calls: Vec<String>,
}

#[derive(Clone, Default)]
pub struct BridgeState {
    page: Arc<Mutex<Page>>,
}

impl BridgeState {
    #[allow(dead_code)]
    pub fn snapshot(&self) -> Page {
        self.page.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn record(&self, endpoint: &str) -> std::sync::MutexGuard<'_, Page> {
        let mut page = self
            .page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        page.calls.push(endpoint.to_string());
        page
    }
}

pub fn create_app() -> (Router, BridgeState) {
    let state = BridgeState::default();
    let app = Router::new()
        .route("/health", get(health))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/navigate", post(navigate))
        .route("/click", post(click))
        .route("/fill", post(fill))
        .route("/type", post(fill))
        .route("/screenshot", post(screenshot))
        .route("/get_text", post(get_text))
        .route("/snapshot", post(snapshot))
        .route("/wait_for", post(wait_for))
        .route("/evaluate", post(evaluate))
        .with_state(state.clone());
    (app, state)
}

fn ok(content: Value) -> Json<Value> {
    Json(json!({ "success": true, "content": content }))
}

fn text(text: impl Into<String>) -> Json<Value> {
    ok(json!([{ "type": "text", "text": text.into() }]))
}

fn failure(message: impl Into<String>) -> Json<Value> {
    Json(json!({ "success": false, "error": message.into() }))
}

fn selector_of(body: &Value) -> String {
    body.get("selector")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn exists(selector: &str) -> bool {
    ELEMENTS.contains(&selector)
}

fn on_dashboard(page: &Page) -> bool {
    page.url.as_deref().is_some_and(|u| u.ends_with("/dashboard"))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn connect(State(state): State<BridgeState>) -> Json<Value> {
    state.record("connect").connected = true;
    text("Connected")
}

async fn disconnect(State(state): State<BridgeState>) -> Json<Value> {
    state.record("disconnect").connected = false;
    text("Disconnected")
}

async fn navigate(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let Some(url) = body.get("url").and_then(Value::as_str) else {
        return failure("url is required");
    };
    let mut page = state.record("navigate");
    page.url = Some(url.to_string());
    page.fields.clear();
    text(format!("Navigated to {}", url))
}

async fn click(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let selector = selector_of(&body);
    let mut page = state.record("click");
    if !exists(&selector) {
        return failure(format!("No element matches {}", selector));
    }
    // Submitting the form lands on the dashboard of the same site
    if selector.contains("submit")
        && let Some(url) = page.url.clone()
        && let Ok(mut parsed) = url::Url::parse(&url)
    {
        parsed.set_path("/dashboard");
        page.url = Some(parsed.to_string());
    }
    page.clicks.push(selector.clone());
    text(format!("Clicked {}", selector))
}

async fn fill(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let selector = selector_of(&body);
    let value = body
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut page = state.record("fill");
    if !exists(&selector) {
        return failure(format!("No element matches {}", selector));
    }
    page.fields.insert(selector.clone(), value);
    text(format!("Filled {}", selector))
}

async fn screenshot(State(state): State<BridgeState>) -> Json<Value> {
    state.record("screenshot");
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.resize(16 * 1024, 0);
    ok(json!([{
        "type": "image",
        "data": base64::engine::general_purpose::STANDARD.encode(png),
        "mimeType": "image/png",
    }]))
}

async fn get_text(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let selector = selector_of(&body);
    let page = state.record("get_text");
    match selector.as_str() {
        "h1" if on_dashboard(&page) => text("Dashboard"),
        "h1" => text("Sign in"),
        other => match page.fields.get(other) {
            Some(value) => text(value.clone()),
            None => failure(format!("No element matches {}", other)),
        },
    }
}

async fn snapshot(State(state): State<BridgeState>) -> Json<Value> {
    let page = state.record("snapshot");
    let heading = if on_dashboard(&page) { "Dashboard" } else { "Sign in" };
    text(format!(
        "<main><h1>{}</h1><input id=\"username\"><input id=\"password\" type=\"password\"><input id=\"otp\"><button type=\"submit\">Sign In</button></main>",
        heading
    ))
}

async fn wait_for(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let selector = selector_of(&body);
    state.record("wait_for");
    if exists(&selector) {
        text(format!("Found {}", selector))
    } else {
        failure(format!("Timeout waiting for {}", selector))
    }
}

async fn evaluate(State(state): State<BridgeState>, Json(body): Json<Value>) -> Json<Value> {
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut page = state.record("evaluate");

    let query = Regex::new(r"querySelector\('((?:[^'\\]|\\.)*)'\)").expect("valid regex");
    let target = query.captures(&code).map(|c| c[1].replace("\\'", "'"));

    let result = if code.contains("window.location.href") {
        page.url.clone().unwrap_or_else(|| "about:blank".to_string())
    } else if code.contains("readyState") {
        "complete".to_string()
    } else if let Some(selector) = target {
        if code.contains("el.value = ''") {
            page.fields.remove(&selector);
            "undefined".to_string()
        } else if code.contains("?.value") {
            page.fields.get(&selector).cloned().unwrap_or_default()
        } else {
            exists(&selector).to_string()
        }
    } else {
        "true".to_string()
    };

    ok(json!([
        { "type": "text", "text": "Executed JavaScript:" },
        { "type": "text", "text": "..." },
        { "type": "text", "text": "Result:" },
        { "type": "text", "text": serde_json::to_string(&result).unwrap_or_default() },
    ]))
}
