//! Execution lifecycle: one background task per run, observable while it runs.
//!
//! Each run tries the bridge first and falls back to the local test runner
//! when the bridge cannot be reached. Progress lives in an injected
//! [`RunRegistry`] so status reads never wait on the run itself.

use anyhow::Context;
use chrono::Utc;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::automation::AutomationClient;
use crate::bridge::{BridgeTransport, HttpBridge};
use crate::config::Config;
use crate::executor::{CaseContext, StepExecutor};
use crate::oracle::{HttpOracle, Oracle};
use crate::otp::{OneTimeCodeSource, TotpGenerator};
use crate::registry::SelectorRegistry;
use crate::runner::FallbackRunner;
use crate::screenshot;
use crate::store::ArtifactStore;
use crate::types::{
    ExecutionMode, ExecutionRecord, ExecutionStatus, ExecutionView, RunResults, RunSummary,
    StepResult, StepStatus, TestCase, TestCaseResult, TestCaseStatus,
};

/// Progress reported once a strategy has been chosen
const STARTED_PROGRESS: u8 = 5;
/// Progress reported once every step has run, before results are saved
const STEPS_DONE_PROGRESS: u8 = 95;

/// In-memory records of runs started by this process
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<DashMap<String, ExecutionRecord>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.runs.get(execution_id).map(|record| record.value().clone())
    }

    fn insert(&self, record: ExecutionRecord) {
        self.runs.insert(record.execution_id.clone(), record);
    }

    /// Apply `change` and return the updated record
    fn update(
        &self,
        execution_id: &str,
        change: impl FnOnce(&mut ExecutionRecord),
    ) -> Option<ExecutionRecord> {
        let mut record = self.runs.get_mut(execution_id)?;
        change(&mut record);
        Some(record.value().clone())
    }
}

#[derive(Clone)]
pub struct ExecutionManager {
    config: Config,
    runs: RunRegistry,
    store: ArtifactStore,
    bridge: Arc<dyn BridgeTransport>,
    oracle: Arc<dyn Oracle>,
    registry: Arc<SelectorRegistry>,
    codes: Arc<dyn OneTimeCodeSource>,
}

impl ExecutionManager {
    pub fn new(config: Config, runs: RunRegistry) -> Self {
        Self {
            store: ArtifactStore::new(&config),
            bridge: Arc::new(HttpBridge::new(&config.bridge_url)),
            oracle: Arc::new(HttpOracle::new(&config.oracle_url)),
            registry: Arc::new(SelectorRegistry::new(config.selectors_dir())),
            codes: Arc::new(TotpGenerator::new(config.totp_secret.clone())),
            runs,
            config,
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn BridgeTransport>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_codes(mut self, codes: Arc<dyn OneTimeCodeSource>) -> Self {
        self.codes = codes;
        self
    }

    pub fn registry(&self) -> &Arc<SelectorRegistry> {
        &self.registry
    }

    /// Start a run in the background. Reusing an id replaces that id's state.
    pub fn start_execution(
        &self,
        code: &str,
        execution_id: &str,
        test_cases: Vec<TestCase>,
    ) -> JoinHandle<()> {
        info!(
            "Starting test execution: {} ({} test cases)",
            execution_id,
            test_cases.len()
        );
        let record = ExecutionRecord::pending(execution_id);
        self.persist(&record);
        self.runs.insert(record);

        let manager = self.clone();
        let code = code.to_string();
        let execution_id = execution_id.to_string();
        tokio::spawn(async move { manager.run(&execution_id, &code, &test_cases).await })
    }

    /// Status of a run; runs from other processes come from their status record, then their results file
    pub fn monitor(&self, execution_id: &str) -> Option<ExecutionView> {
        if let Some(record) = self.runs.get(execution_id) {
            return Some(ExecutionView::from(&record));
        }
        match self.store.read_status(execution_id) {
            Ok(Some(record)) => return Some(ExecutionView::from(&record)),
            Ok(None) => {}
            Err(e) => warn!("Could not read status for {}: {}", execution_id, e),
        }
        match self.store.read_results(execution_id) {
            Ok(Some(results)) => Some(ExecutionView {
                status: ExecutionStatus::Completed,
                progress: 100,
                mode: results.mode,
                started_at: None,
                completed_at: None,
                error: results.error,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!("Could not read results for {}: {}", execution_id, e);
                None
            }
        }
    }

    /// Full record of a run started by this process
    pub fn record(&self, execution_id: &str) -> Option<ExecutionRecord> {
        self.runs.get(execution_id)
    }

    async fn run(&self, execution_id: &str, code: &str, test_cases: &[TestCase]) {
        let started = Instant::now();
        self.transition(execution_id, |record| {
            record.status = ExecutionStatus::Running;
            record.started_at = Some(Utc::now());
        });

        match self.execute(execution_id, code, test_cases).await {
            Ok((mode, results)) => {
                let summary = RunSummary::of(&results);
                let run_results = RunResults {
                    execution_id: execution_id.to_string(),
                    status: ExecutionStatus::Completed,
                    mode: Some(mode),
                    test_results: results.clone(),
                    duration_secs: started.elapsed().as_secs_f64(),
                    summary: summary.clone(),
                    error: None,
                };
                if let Err(e) = self.store.write_results(&run_results) {
                    error!("Failed to save results for {}: {}", execution_id, e);
                }
                self.transition(execution_id, |record| {
                    record.status = ExecutionStatus::Completed;
                    record.advance(100);
                    record.completed_at = Some(Utc::now());
                    record.results = results;
                });
                info!(
                    "Test execution completed: {} ({}/{} test cases passed)",
                    execution_id, summary.passed, summary.total
                );
            }
            Err(e) => {
                error!("Error executing tests for {}: {:#}", execution_id, e);
                self.transition(execution_id, |record| {
                    record.status = ExecutionStatus::Failed;
                    record.error = Some(format!("{:#}", e));
                    record.completed_at = Some(Utc::now());
                });
            }
        }
    }

    async fn execute(
        &self,
        execution_id: &str,
        code: &str,
        test_cases: &[TestCase],
    ) -> anyhow::Result<(ExecutionMode, Vec<TestCaseResult>)> {
        let client = Arc::new(AutomationClient::new(
            self.bridge.clone(),
            self.config.client.clone(),
        ));

        let bound = self.config.bridge_connect_bound;
        let connected = match tokio::time::timeout(bound, client.connect()).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Bridge unavailable ({}), falling back to local test runner", e);
                false
            }
            Err(_) => {
                warn!(
                    "Bridge connect exceeded {:?}, falling back to local test runner",
                    bound
                );
                false
            }
        };

        let mode = if connected {
            ExecutionMode::Bridge
        } else {
            ExecutionMode::Fallback
        };
        self.transition(execution_id, |record| {
            record.mode = Some(mode);
            record.advance(STARTED_PROGRESS);
        });

        let results = if connected {
            let results = self
                .run_with_bridge(execution_id, code, test_cases, client.clone())
                .await;
            client.close().await;
            results
        } else {
            self.run_with_runner(execution_id, code, test_cases).await?
        };
        Ok((mode, results))
    }

    async fn run_with_bridge(
        &self,
        execution_id: &str,
        code: &str,
        test_cases: &[TestCase],
        client: Arc<AutomationClient>,
    ) -> Vec<TestCaseResult> {
        let executor = StepExecutor::new(
            client,
            self.oracle.clone(),
            self.registry.clone(),
            self.codes.clone(),
            self.config.screenshots_dir(),
        );
        let code_context = Some(code).filter(|c| !c.trim().is_empty());
        let total_steps: usize = test_cases.iter().map(|tc| tc.steps.len()).sum();
        let mut steps_done = 0;
        let mut results = Vec::with_capacity(test_cases.len());

        for (index, test_case) in test_cases.iter().enumerate() {
            info!(
                "Running test case {} ({}/{}): {}",
                test_case.id,
                index + 1,
                test_cases.len(),
                test_case.name
            );
            let mut ctx = CaseContext::new(execution_id, &test_case.id);
            let mut step_results = Vec::with_capacity(test_case.steps.len());

            for step in &test_case.steps {
                let result = executor.execute_step(&mut ctx, step, code_context).await;
                let passed = result.status.is_passed();
                step_results.push(result);
                steps_done += 1;
                self.report_progress(execution_id, steps_done, total_steps);
                if !passed {
                    warn!(
                        "Step {} failed, skipping the rest of test case {}",
                        step.step_number, test_case.id
                    );
                    break;
                }
            }

            // Skipped steps still count as done
            steps_done += test_case.steps.len() - step_results.len();
            self.report_progress(execution_id, steps_done, total_steps);

            let result = TestCaseResult::from_steps(test_case, step_results);
            info!("Test case {} {:?}", test_case.id, result.status);
            results.push(result);
        }
        results
    }

    /// Hand the generated code to the local runner; verdicts are per test case only
    async fn run_with_runner(
        &self,
        execution_id: &str,
        code: &str,
        test_cases: &[TestCase],
    ) -> anyhow::Result<Vec<TestCaseResult>> {
        let test_file = self
            .store
            .write_generated_code(execution_id, code)
            .context("Failed to write generated test code")?;
        let runner = FallbackRunner::new(
            self.config.runner_command.clone(),
            self.config.runner_timeout,
        );
        let outcome = runner.run(&test_file).await?;
        if !outcome.success {
            warn!(
                "Local test runner failed (exit code {:?}, timed out: {})",
                outcome.exit_code, outcome.timed_out
            );
        }
        self.transition(execution_id, |record| record.advance(STEPS_DONE_PROGRESS));

        let screenshots_dir = self.config.screenshots_dir();
        Ok(test_cases
            .iter()
            .map(|test_case| {
                let captures =
                    screenshot::list_case_captures(&screenshots_dir, execution_id, &test_case.id);
                let passed = outcome.success && !captures.is_empty();
                let error = if passed {
                    None
                } else if outcome.timed_out {
                    Some(format!(
                        "Local test runner timed out after {:?}",
                        self.config.runner_timeout
                    ))
                } else if !outcome.success {
                    Some(match outcome.exit_code {
                        Some(code) => format!("Local test runner exited with code {}", code),
                        None => "Local test runner was terminated by a signal".to_string(),
                    })
                } else {
                    Some("No screenshots were captured for this test case".to_string())
                };
                TestCaseResult {
                    test_case_id: test_case.id.clone(),
                    name: test_case.name.clone(),
                    status: if passed {
                        TestCaseStatus::Passed
                    } else {
                        TestCaseStatus::Failed
                    },
                    steps: test_case
                        .steps
                        .iter()
                        .map(|step| {
                            let mut result = StepResult::new(step, StepStatus::Unknown);
                            result.screenshot = capture_for_step(&captures, step.step_number)
                                .map(|path| path.display().to_string());
                            result
                        })
                        .collect(),
                    error,
                }
            })
            .collect())
    }

    fn report_progress(&self, execution_id: &str, done: usize, total: usize) {
        let span = usize::from(STEPS_DONE_PROGRESS - STARTED_PROGRESS);
        let progress = STARTED_PROGRESS as usize + done.min(total) * span / total.max(1);
        self.transition(execution_id, |record| record.advance(progress as u8));
    }

    /// Update the in-memory record and persist the new state
    fn transition(&self, execution_id: &str, change: impl FnOnce(&mut ExecutionRecord)) {
        match self.runs.update(execution_id, change) {
            Some(record) => self.persist(&record),
            None => debug!("No run registered under {}", execution_id),
        }
    }

    fn persist(&self, record: &ExecutionRecord) {
        if let Err(e) = self.store.write_status(record) {
            warn!("Failed to save status for {}: {}", record.execution_id, e);
        }
    }
}

/// Capture whose name starts with the step's number
fn capture_for_step(captures: &[PathBuf], step_number: u32) -> Option<&PathBuf> {
    let prefix = format!("step_{:02}_", step_number);
    captures.iter().find(|path| {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&prefix))
    })
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;
