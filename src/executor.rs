//! Interpret, act, capture, verify and learn for a single step.
//!
//! [`StepExecutor`] drives one natural-language step end to end. The action is
//! resolved from the selector cache when possible and from the oracle
//! otherwise. It is then executed through the [`AutomationClient`], captured,
//! judged by the oracle and, when it passed, its selector is remembered.

use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::automation::AutomationClient;
use crate::errors::{Result, StepwiseError};
use crate::oracle::{Check, InterpretRequest, Oracle, ValidationRequest, ValidationResponse};
use crate::otp::OneTimeCodeSource;
use crate::registry::SelectorRegistry;
use crate::screenshot;
use crate::step_text::{self, Verb};
use crate::types::{Step, StepResult, StepStatus, ValidationDetail};

const CHECK_SUMMARY_LEN: usize = 100;
const DOM_PREVIEW_LEN: usize = 1000;

/// A one-time-code field filled earlier in the current test case
#[derive(Debug, Clone, PartialEq)]
pub struct OneTimeCodeField {
    pub selector: String,
    /// Step that produced the code, reused to regenerate it
    pub step: String,
}

/// State carried from step to step within one test case
#[derive(Debug, Clone)]
pub struct CaseContext {
    pub execution_id: String,
    pub test_case_id: String,
    pub one_time_code_field: Option<OneTimeCodeField>,
}

impl CaseContext {
    pub fn new(execution_id: &str, test_case_id: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            test_case_id: test_case_id.to_string(),
            one_time_code_field: None,
        }
    }
}

/// How a step's action was decided
#[derive(Debug)]
struct Resolution {
    action: Action,
    reasoning: Option<String>,
    from_cache: bool,
    one_time_code: bool,
    /// Page the action targets, used when the selector is learned
    url: Option<String>,
    element_type: Option<&'static str>,
}

pub struct StepExecutor {
    client: Arc<AutomationClient>,
    oracle: Arc<dyn Oracle>,
    registry: Arc<SelectorRegistry>,
    codes: Arc<dyn OneTimeCodeSource>,
    screenshots_dir: PathBuf,
}

impl StepExecutor {
    pub fn new(
        client: Arc<AutomationClient>,
        oracle: Arc<dyn Oracle>,
        registry: Arc<SelectorRegistry>,
        codes: Arc<dyn OneTimeCodeSource>,
        screenshots_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            oracle,
            registry,
            codes,
            screenshots_dir: screenshots_dir.into(),
        }
    }

    pub fn client(&self) -> &Arc<AutomationClient> {
        &self.client
    }

    /// Execute one step. Failures are reported in the result, never raised.
    pub async fn execute_step(
        &self,
        ctx: &mut CaseContext,
        step: &Step,
        code_context: Option<&str>,
    ) -> StepResult {
        info!("Executing step {}: {}", step.step_number, step.description);
        let mut result = StepResult::new(step, StepStatus::Failed);

        if let Err(e) = self.run(ctx, step, code_context, &mut result).await {
            error!("Error executing step {}: {}", step.step_number, e);
            result.status = StepStatus::Failed;
            result.error = Some(e.to_string());
            result.screenshot = self.error_capture(ctx, step).await;
        }
        result
    }

    async fn run(
        &self,
        ctx: &mut CaseContext,
        step: &Step,
        code_context: Option<&str>,
        result: &mut StepResult,
    ) -> Result<()> {
        let resolution = self.resolve(step, code_context).await?;
        info!(
            "Step {} resolved to {}{}",
            step.step_number,
            resolution.action,
            if resolution.from_cache { " (cached selector)" } else { "" }
        );
        result.action = Some(resolution.action.name().to_string());
        result.parameters = resolution.action.parameters();
        result.reasoning = resolution.reasoning.clone();
        result.from_cache = resolution.from_cache;

        self.act(ctx, step, &resolution).await?;
        result.screenshot = self.capture(ctx, step).await?;

        let expected = step
            .expected_result
            .clone()
            .or_else(|| step_text::mine_expectation(&step.description));
        let validation = match self.verify(step, &resolution.action, expected).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("Validation error for step {}: {}", step.step_number, e);
                ValidationDetail {
                    valid: false,
                    reasoning: format!("Validation error: {}", e),
                    checks_performed: Vec::new(),
                    evidence: Some("Validation could not be completed".to_string()),
                }
            }
        };

        if validation.valid {
            info!(
                "Step {} validation passed: {}",
                step.step_number, validation.reasoning
            );
            result.status = StepStatus::Passed;
            self.learn(step, &resolution).await;
        } else {
            warn!(
                "Step {} validation failed: {}",
                step.step_number, validation.reasoning
            );
            result.status = StepStatus::Failed;
            self.error_capture(ctx, step).await;
        }
        result.validation = Some(validation);
        Ok(())
    }

    async fn resolve(&self, step: &Step, code_context: Option<&str>) -> Result<Resolution> {
        let description = step.description.as_str();
        let verb = step_text::infer_verb(description);
        let element_type = verb.and_then(|v| step_text::infer_element_type(description, v));
        let code_step = step_text::is_one_time_code_step(description, None)
            || element_type == Some("totp_code");
        let current_url = self.client.current_url().await;

        let cached = match (verb, element_type, current_url.as_deref()) {
            (Some(verb), Some(element_type), Some(url)) => {
                self.registry.lookup(url, description, element_type, verb)
            }
            _ => None,
        };

        if let (Some(verb), Some(selector)) = (verb, cached.as_deref())
            && let Some(action) = self.cached_action(description, verb, selector, code_step)?
        {
            let one_time_code = code_step && matches!(action, Action::Fill { .. });
            return Ok(Resolution {
                action,
                reasoning: Some(format!("Selector for {} reused from registry", selector)),
                from_cache: true,
                one_time_code,
                url: current_url,
                element_type,
            });
        }

        let dom_snapshot = if matches!(verb, Some(Verb::Navigate)) {
            None
        } else {
            match self.client.get_dom().await {
                Ok(dom) if !dom.is_empty() => Some(dom),
                Ok(_) => None,
                Err(e) => {
                    debug!("No DOM snapshot for interpretation: {}", e);
                    None
                }
            }
        };

        let request = InterpretRequest {
            step_description: description.to_string(),
            code_context: code_context.map(str::to_string),
            dom_snapshot,
            expected_result: step.expected_result.clone(),
            current_url: current_url.clone(),
            selector_hint: cached,
        };
        let interpretation = self.oracle.interpret(&request).await?;
        debug!(
            "Interpreted as {} {}",
            interpretation.action, interpretation.parameters
        );

        let mut parameters = match interpretation.parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let is_fill = interpretation.action.trim().eq_ignore_ascii_case("fill");
        let text = parameters
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string);
        let one_time_code =
            is_fill && (code_step || step_text::is_one_time_code_step(description, text.as_deref()));
        if one_time_code {
            match self.codes.code_for(description) {
                Ok(code) => {
                    parameters.insert("text".to_string(), json!(code));
                }
                Err(e) if text.is_some_and(|t| !t.is_empty()) => {
                    warn!("Could not generate one-time code, using interpreted text: {}", e);
                }
                Err(e) => return Err(e),
            }
        }

        let action = Action::parse(&interpretation.action, &Value::Object(parameters))?;
        Ok(Resolution {
            action,
            reasoning: interpretation.reasoning,
            from_cache: false,
            one_time_code,
            url: current_url,
            element_type,
        })
    }

    /// Action built from a cached selector alone, when the step text carries the rest
    fn cached_action(
        &self,
        description: &str,
        verb: Verb,
        selector: &str,
        code_step: bool,
    ) -> Result<Option<Action>> {
        let selector = selector.to_string();
        match verb {
            Verb::Click => Ok(Some(Action::Click { selector })),
            Verb::Fill if code_step => {
                let text = self.codes.code_for(description)?;
                Ok(Some(Action::Fill { selector, text }))
            }
            Verb::Fill => Ok(step_text::quoted_text(description)
                .map(|text| Action::Fill { selector, text })),
            Verb::Navigate | Verb::Wait | Verb::GetText => Ok(None),
        }
    }

    async fn act(&self, ctx: &mut CaseContext, step: &Step, resolution: &Resolution) -> Result<()> {
        let settings = self.client.settings();
        match &resolution.action {
            Action::Navigate { url } => self.client.navigate(url).await,
            Action::Click { selector } => {
                if step_text::is_submit_click(&step.description)
                    && let Some(field) = ctx.one_time_code_field.clone()
                {
                    self.refresh_one_time_code(&field).await;
                }
                self.client.click(selector).await?;
                let settle = if step_text::is_navigation_click(&step.description) {
                    settings.navigation_click_settle
                } else {
                    settings.click_settle
                };
                tokio::time::sleep(settle).await;
                Ok(())
            }
            Action::Fill { selector, text } => {
                self.client
                    .fill(selector, text, resolution.one_time_code)
                    .await?;
                if resolution.one_time_code {
                    ctx.one_time_code_field = Some(OneTimeCodeField {
                        selector: selector.clone(),
                        step: step.description.clone(),
                    });
                }
                Ok(())
            }
            Action::WaitFor {
                selector,
                timeout_ms,
            } => {
                self.client
                    .wait_for(selector, timeout_ms.unwrap_or(settings.wait_step_timeout_ms))
                    .await
            }
            Action::GetText { selector } => {
                let text = self.client.get_text(selector).await?;
                info!("Text of {}: {}", selector, text);
                Ok(())
            }
            Action::Screenshot => Ok(()),
        }
    }

    /// Re-enter a one-time code that expired between filling and submitting
    async fn refresh_one_time_code(&self, field: &OneTimeCodeField) {
        let code = match self.codes.code_for(&field.step) {
            Ok(code) => code,
            Err(e) => {
                warn!("Could not regenerate one-time code before submit: {}", e);
                return;
            }
        };
        match self.client.read_value(&field.selector).await {
            Ok(current) if current.trim() == code => {
                debug!("One-time code in {} is still current", field.selector);
            }
            Ok(_) => {
                info!("One-time code rolled over, re-filling {}", field.selector);
                if let Err(e) = self.client.fill(&field.selector, &code, true).await {
                    warn!("Could not re-fill one-time code: {}", e);
                }
            }
            Err(e) => warn!("Could not read one-time code field: {}", e),
        }
    }

    async fn capture(&self, ctx: &CaseContext, step: &Step) -> Result<Option<String>> {
        tokio::time::sleep(self.client.settings().capture_delay).await;
        let path = screenshot::step_path(
            &self.screenshots_dir,
            &ctx.execution_id,
            &ctx.test_case_id,
            step.step_number,
            &step.description,
        );
        match self.client.screenshot(&path).await {
            Ok(capture) => {
                if capture.blank_suspected {
                    warn!(
                        "Screenshot for step {} may be blank ({} bytes)",
                        step.step_number, capture.bytes
                    );
                }
                Ok(Some(capture.path.display().to_string()))
            }
            Err(e @ StepwiseError::Artifact(_)) => {
                warn!("{}; continuing without a screenshot", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Best-effort capture of the page state a step failed in
    async fn error_capture(&self, ctx: &CaseContext, step: &Step) -> Option<String> {
        let path = screenshot::error_path(
            &self.screenshots_dir,
            &ctx.execution_id,
            &ctx.test_case_id,
            step.step_number,
        );
        match self.client.screenshot(&path).await {
            Ok(capture) => Some(capture.path.display().to_string()),
            Err(e) => {
                warn!("Could not capture error screenshot: {}", e);
                None
            }
        }
    }

    async fn verify(
        &self,
        step: &Step,
        action: &Action,
        expected_result: Option<String>,
    ) -> Result<ValidationDetail> {
        let dom_snapshot = self.client.get_dom().await?;
        let mut request = ValidationRequest {
            step_description: step.description.clone(),
            action: action.name().to_string(),
            parameters: action.parameters(),
            expected_result,
            dom_snapshot: Some(dom_snapshot),
            tool_results: None,
        };

        let plan = self.oracle.validate(&request).await?;
        if plan.checks_needed.is_empty() {
            return Ok(detail(plan, Vec::new()));
        }

        let (tool_results, performed) = self.run_checks(&plan.checks_needed).await;
        if tool_results.is_empty() {
            return Ok(detail(plan, performed));
        }
        request.tool_results = Some(Value::Object(tool_results));
        let verdict = self.oracle.validate(&request).await?;
        Ok(detail(verdict, performed))
    }

    /// Gather the evidence the oracle asked for; failures become evidence too
    async fn run_checks(&self, checks: &[Check]) -> (Map<String, Value>, Vec<String>) {
        let mut results = Map::new();
        let mut performed = Vec::new();
        for check in checks {
            match self.run_check(check).await {
                Ok(Some((entry, summary))) => {
                    results.insert(format!("{}_{}", check.tool, results.len()), entry);
                    performed.push(summary);
                }
                Ok(None) => debug!("Skipping check {:?}", check),
                Err(e) => {
                    warn!("Error executing check {}: {}", check.tool, e);
                    results.insert(
                        format!("error_{}", results.len()),
                        json!({ "tool": check.tool, "error": e.to_string(), "purpose": check.purpose }),
                    );
                    performed.push(format!(
                        "Error executing {}: {}",
                        check.tool,
                        clip(&e.to_string(), CHECK_SUMMARY_LEN)
                    ));
                }
            }
        }
        (results, performed)
    }

    async fn run_check(&self, check: &Check) -> Result<Option<(Value, String)>> {
        let target = check.code_or_selector.trim();
        match check.tool.as_str() {
            "evaluate" if !target.is_empty() => {
                let value = self.client.evaluate(target).await?;
                let shown = value.clone().unwrap_or_else(|| "None".to_string());
                info!("Check result: {} -> {}", target, clip(&shown, 200));
                let mut entry = json!({ "code": target, "result": value, "purpose": check.purpose });
                if target.to_lowercase().contains("location") {
                    entry["url"] = json!(shown);
                    entry["is_url_check"] = json!(true);
                }
                Ok(Some((
                    entry,
                    format!("Evaluated: {} -> {}", target, clip(&shown, CHECK_SUMMARY_LEN)),
                )))
            }
            "get_text" if !target.is_empty() => {
                let text = self.client.get_text(target).await?;
                let summary = format!("Got text from {}: {}", target, clip(&text, CHECK_SUMMARY_LEN));
                Ok(Some((
                    json!({ "selector": target, "result": text, "purpose": check.purpose }),
                    summary,
                )))
            }
            "get_dom" => {
                let dom = self.client.get_dom().await?;
                let preview = if dom.is_empty() {
                    "empty".to_string()
                } else {
                    clip(&dom, DOM_PREVIEW_LEN)
                };
                Ok(Some((
                    json!({ "result_preview": preview, "purpose": check.purpose }),
                    format!("Got DOM snapshot (length: {})", dom.len()),
                )))
            }
            "wait_for" if !target.is_empty() => {
                let found = self
                    .client
                    .wait_for_element(target, self.client.settings().check_wait_ms)
                    .await;
                Ok(Some((
                    json!({ "selector": target, "result": found, "purpose": check.purpose }),
                    format!(
                        "Waited for {}: {}",
                        target,
                        if found { "found" } else { "not found" }
                    ),
                )))
            }
            _ => Ok(None),
        }
    }

    /// Remember the selector of a fill or click that verified
    async fn learn(&self, step: &Step, resolution: &Resolution) {
        let (Some(url), Some(element_type)) = (&resolution.url, resolution.element_type) else {
            return;
        };
        let selector = match &resolution.action {
            Action::Fill { selector, .. } | Action::Click { selector } => selector,
            _ => return,
        };
        if let Err(e) = self
            .registry
            .save(url, &step.description, element_type, selector)
            .await
        {
            warn!("Could not save selector to registry: {}", e);
        }
    }
}

fn detail(response: ValidationResponse, checks_performed: Vec<String>) -> ValidationDetail {
    ValidationDetail {
        valid: response.valid,
        reasoning: response.reasoning.unwrap_or_default(),
        checks_performed,
        evidence: response.evidence.map(|evidence| match evidence {
            Value::String(s) => s,
            other => other.to_string(),
        }),
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod executor_test;
