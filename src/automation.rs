//! Browser operations over the automation bridge.
//!
//! [`AutomationClient`] wraps a [`BridgeTransport`] and turns each primitive
//! into a verified operation: navigation waits for the page to settle, clicks
//! wait for their target, fills are read back, and screenshots are located on
//! disk and checked for blank captures.

use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeReply, BridgeTransport, HttpBridge};
use crate::config::ClientSettings;
use crate::errors::{Result, StepwiseError};
use crate::fill::{self, FillStrategy, Outcome};
use crate::screenshot;
use crate::script;

/// A screenshot placed at its requested path
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub path: PathBuf,
    pub bytes: u64,
    /// Still under the blank threshold after every attempt
    pub blank_suspected: bool,
}

pub struct AutomationClient {
    transport: Arc<dyn BridgeTransport>,
    settings: ClientSettings,
    /// Serializes bridge calls: one outstanding request per client
    call_lock: Mutex<()>,
    connected: Mutex<bool>,
    last_url: std::sync::Mutex<Option<String>>,
}

impl AutomationClient {
    pub fn new(transport: Arc<dyn BridgeTransport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
            call_lock: Mutex::new(()),
            connected: Mutex::new(false),
            last_url: std::sync::Mutex::new(None),
        }
    }

    /// Client for a bridge reachable over HTTP
    pub fn http(bridge_url: &str, settings: ClientSettings) -> Self {
        Self::new(Arc::new(HttpBridge::new(bridge_url)), settings)
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }

    /// Establish the bridge session if it is not up yet
    pub async fn connect(&self) -> Result<()> {
        let mut connected = self.connected.lock().await;
        if *connected {
            return Ok(());
        }

        info!("Connecting to bridge at {}", self.transport.describe());
        self.transport.health(self.settings.health_timeout).await?;

        let reply = self
            .dispatch("connect", &json!({}), self.settings.connect_timeout)
            .await?;
        if !reply.success {
            return Err(StepwiseError::transport(
                "connect",
                reply
                    .error
                    .unwrap_or_else(|| "Failed to connect to bridge".to_string()),
            ));
        }

        *connected = true;
        info!("Bridge session established");
        Ok(())
    }

    /// End the session; safe to call repeatedly, errors are only logged
    pub async fn close(&self) {
        let mut connected = self.connected.lock().await;
        if !*connected {
            return;
        }
        *connected = false;
        if let Err(e) = self
            .dispatch("disconnect", &json!({}), self.settings.disconnect_timeout)
            .await
        {
            warn!("Error disconnecting from bridge: {}", e);
        }
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        body: &Value,
        timeout: std::time::Duration,
    ) -> Result<BridgeReply> {
        let _guard = self.call_lock.lock().await;
        match tokio::time::timeout(timeout, self.transport.post(endpoint, body, timeout)).await {
            Ok(reply) => reply,
            Err(_) => Err(StepwiseError::Timeout(format!(
                "bridge call /{} after {:?}",
                endpoint, timeout
            ))),
        }
    }

    async fn call(&self, endpoint: &str, body: Value) -> Result<BridgeReply> {
        self.connect().await?;
        self.dispatch(endpoint, &body, self.settings.call_timeout).await
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.call("navigate", json!({ "url": url }))
            .await?
            .into_result("navigate", "Navigation failed")?;

        if let Ok(mut last) = self.last_url.lock() {
            *last = Some(url.to_string());
        }
        self.wait_ready(self.settings.ready_timeout_ms).await;
        info!("Navigated to {}", url);
        Ok(())
    }

    /// Wait for the page to look rendered; degrades to a fixed pause on failure
    pub async fn wait_ready(&self, timeout_ms: u64) -> bool {
        debug!("Waiting for page to be ready ({}ms)", timeout_ms);
        let outcome = self
            .call(
                "evaluate",
                json!({ "code": script::page_ready(timeout_ms), "timeout": timeout_ms }),
            )
            .await;

        match outcome {
            Ok(reply) if reply.success => {
                debug!("Page ready check result: {}", reply.first_text());
                tokio::time::sleep(self.settings.settle_delay).await;
                true
            }
            Ok(reply) => {
                warn!(
                    "Page ready check failed ({}), using fallback delay",
                    reply.error.unwrap_or_default()
                );
                tokio::time::sleep(self.settings.ready_fallback_delay).await;
                false
            }
            Err(e) => {
                warn!("Error waiting for page ready: {}", e);
                tokio::time::sleep(self.settings.ready_fallback_delay).await;
                false
            }
        }
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        let wait_ms = self.settings.click_wait_ms;
        info!("Waiting for element to be present before clicking: {}", selector);
        if !self.element_present(selector, wait_ms).await? {
            return Err(StepwiseError::ElementNotFound {
                selector: selector.to_string(),
                timeout_ms: wait_ms,
            });
        }

        self.call("click", json!({ "selector": selector }))
            .await?
            .into_result("click", "Click failed")?;
        info!("Clicked {}", selector);
        Ok(())
    }

    /// Fill a field and confirm the value landed, escalating through strategies.
    ///
    /// Returns the strategy that verified.
    pub async fn fill(
        &self,
        selector: &str,
        text: &str,
        is_one_time_code: bool,
    ) -> Result<FillStrategy> {
        let strategies = fill::plan(is_one_time_code);
        match fill::first_verified(strategies, move |strategy| {
            self.attempt_fill(selector, text, is_one_time_code, strategy)
        })
        .await
        {
            Ok(strategy) => {
                info!("Filled {} using {}", selector, strategy);
                Ok(strategy)
            }
            Err(attempts) => Err(StepwiseError::Verification {
                operation: format!("fill {}", selector),
                attempts,
            }),
        }
    }

    async fn attempt_fill(
        &self,
        selector: &str,
        text: &str,
        is_one_time_code: bool,
        strategy: FillStrategy,
    ) -> Result<Outcome> {
        debug!("Trying {} for {}", strategy, selector);
        match strategy {
            FillStrategy::Standard => {
                if let Err(e) = self.focus_and_clear(selector).await {
                    warn!("Could not focus/clear {} before fill: {}", selector, e);
                }
                self.call("fill", json!({ "selector": selector, "text": text }))
                    .await?
                    .into_result("fill", "Fill failed")?;
            }
            FillStrategy::ScriptedSetter => {
                self.evaluate(&script::native_setter_fill(selector, text))
                    .await?;
            }
            FillStrategy::ScriptedKeystrokes => {
                self.evaluate(&script::keystroke_fill(selector, text)).await?;
            }
            FillStrategy::RemoteType => {
                self.call("type", json!({ "selector": selector, "text": text }))
                    .await?
                    .into_result("type", "Type failed")?;
            }
        }

        tokio::time::sleep(self.settings.fill_verify_delay).await;
        let actual = self.read_value(selector).await?;
        if fill::value_matches(&actual, text, is_one_time_code) {
            Ok(Outcome::Verified)
        } else {
            warn!("{} did not stick for {}: read back '{}'", strategy, selector, actual);
            Ok(Outcome::Unverified(actual))
        }
    }

    async fn focus_and_clear(&self, selector: &str) -> Result<()> {
        self.evaluate(&script::focus(selector)).await?;
        tokio::time::sleep(self.settings.input_delay).await;
        self.evaluate(&script::clear(selector)).await?;
        tokio::time::sleep(self.settings.input_delay).await;
        Ok(())
    }

    /// Current value of a field, empty when absent
    pub async fn read_value(&self, selector: &str) -> Result<String> {
        Ok(self
            .evaluate(&script::read_value(selector))
            .await?
            .unwrap_or_default())
    }

    /// Capture the full page into `path`, retrying captures that look blank
    pub async fn screenshot(&self, path: &Path) -> Result<Capture> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("screenshot")
            .to_string();
        let attempts = self.settings.screenshot_attempts.max(1);

        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            let ready_ms = self.settings.ready_timeout_ms
                + u64::from(attempt) * self.settings.ready_timeout_step_ms;
            debug!("Taking screenshot (attempt {}/{})", attempt + 1, attempts);
            self.wait_ready(ready_ms).await;

            // A file left over from an earlier run must not pass for this capture
            let _ = tokio::fs::remove_file(path).await;

            let reply = self
                .call(
                    "screenshot",
                    json!({ "name": stem, "savePng": true, "fullPage": true }),
                )
                .await?;
            if !reply.success {
                let message = reply
                    .error
                    .unwrap_or_else(|| "Screenshot failed".to_string());
                warn!("Screenshot attempt {} failed: {}", attempt + 1, message);
                if last {
                    return Err(StepwiseError::remote(
                        "screenshot",
                        format!("failed after {} attempts: {}", attempts, message),
                    ));
                }
                tokio::time::sleep(self.settings.screenshot_retry_delay).await;
                continue;
            }

            if !self.place_artifact(path, &stem, &reply).await? {
                warn!("Screenshot file not found for {}", path.display());
                if last {
                    return Err(StepwiseError::Artifact(path.display().to_string()));
                }
                tokio::time::sleep(self.settings.screenshot_retry_delay).await;
                continue;
            }

            let bytes = tokio::fs::metadata(path).await?.len();
            if bytes < self.settings.screenshot_min_bytes {
                if last {
                    warn!(
                        "Screenshot is still blank after {} attempts ({} bytes)",
                        attempts, bytes
                    );
                    return Ok(Capture {
                        path: path.to_path_buf(),
                        bytes,
                        blank_suspected: true,
                    });
                }
                warn!("Screenshot is too small ({} bytes), likely blank. Retrying", bytes);
                let _ = tokio::fs::remove_file(path).await;
                tokio::time::sleep(self.settings.screenshot_retry_delay).await;
                continue;
            }

            info!("Screenshot captured: {} ({} bytes)", path.display(), bytes);
            return Ok(Capture {
                path: path.to_path_buf(),
                bytes,
                blank_suspected: false,
            });
        }

        Err(StepwiseError::Artifact(path.display().to_string()))
    }

    /// Make sure the capture ends up at `path`; false when it cannot be found
    async fn place_artifact(&self, path: &Path, stem: &str, reply: &BridgeReply) -> Result<bool> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(true);
        }

        if let Some(reported) = screenshot::reported_path(reply.items())
            && tokio::fs::try_exists(&reported).await.unwrap_or(false)
        {
            info!("Found screenshot at reported path: {}", reported.display());
            tokio::fs::copy(&reported, path).await?;
            return Ok(true);
        }

        if let Some(bytes) = screenshot::inline_image(reply.items()) {
            debug!("Writing inline screenshot content ({} bytes)", bytes.len());
            tokio::fs::write(path, bytes).await?;
            return Ok(true);
        }

        let Some(dir) = &self.settings.artifact_fallback_dir else {
            return Ok(false);
        };
        let started = Instant::now();
        loop {
            if let Some(found) = screenshot::find_recent(
                dir,
                stem,
                self.settings.artifact_recent_named,
                self.settings.artifact_recent_any,
            ) {
                info!("Found screenshot at {}", found.display());
                tokio::fs::copy(&found, path).await?;
                return Ok(true);
            }
            if started.elapsed() >= self.settings.artifact_search_window {
                return Ok(false);
            }
            tokio::time::sleep(self.settings.artifact_poll_interval).await;
        }
    }

    /// Evaluate a JS expression or arrow-function literal in the page
    pub async fn evaluate(&self, expression: &str) -> Result<Option<String>> {
        let code = script::to_invocable(expression);
        let reply = self
            .call(
                "evaluate",
                json!({ "code": code, "timeout": self.settings.evaluate_timeout_ms }),
            )
            .await?
            .into_result("evaluate", "Evaluate failed")?;

        let value = script::extract_eval_result(reply.items());
        if value.is_none() && !reply.items().is_empty() {
            warn!("Could not extract evaluate result from {}", reply.content);
        }
        Ok(value)
    }

    pub async fn get_text(&self, selector: &str) -> Result<String> {
        Ok(self
            .call("get_text", json!({ "selector": selector }))
            .await?
            .into_result("get_text", "Get text failed")?
            .first_text())
    }

    /// Accessibility/DOM snapshot of the current page
    pub async fn get_dom(&self) -> Result<String> {
        Ok(self
            .call("snapshot", json!({}))
            .await?
            .into_result("snapshot", "Get DOM failed")?
            .first_text())
    }

    pub async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.call(
            "wait_for",
            json!({ "selector": selector, "timeout": timeout_ms }),
        )
        .await?
        .into_result("wait_for", "Wait for failed")?;
        Ok(())
    }

    /// Like [`wait_for`](Self::wait_for) but reports absence as `false`
    pub async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> bool {
        match self.element_present(selector, timeout_ms).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Element {} not found within {}ms: {}", selector, timeout_ms, e);
                false
            }
        }
    }

    /// Absence is `Ok(false)`; a bridge that cannot be reached is an error
    async fn element_present(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        match self
            .call(
                "wait_for",
                json!({ "selector": selector, "timeout": timeout_ms }),
            )
            .await
        {
            Ok(reply) => Ok(reply.success),
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                warn!("Element {} not found within {}ms: {}", selector, timeout_ms, e);
                Ok(false)
            }
        }
    }

    /// URL the page is on, falling back to the last navigation target
    pub async fn current_url(&self) -> Option<String> {
        match self.evaluate("window.location.href").await {
            Ok(Some(url)) if !url.is_empty() => Some(url),
            Ok(_) | Err(_) => self.last_url.lock().ok().and_then(|last| last.clone()),
        }
    }
}

#[cfg(test)]
#[path = "automation_test.rs"]
mod automation_test;
