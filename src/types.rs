use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Registered but the background task has not started yet
    Pending,
    /// Test cases are being executed
    Running,
    /// Every test case ran (individual test cases may still have failed)
    Completed,
    /// The run itself aborted
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

/// Which strategy produced the results of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Per-step interpret/act/verify loop through the automation bridge
    Bridge,
    /// Local test-runner subprocess; per-step verdicts are unavailable
    Fallback,
}

/// A generated test case
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "RawTestCase")]
pub struct TestCase {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    pub steps: Vec<Step>,
}

/// One natural-language step of a test case
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub step_number: u32,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_result: Option<String>,
}

/// Wire shape of a test case: steps may be bare strings
#[derive(Deserialize)]
struct RawTestCase {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    expected_result: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStep {
    Text(String),
    Full {
        #[serde(default)]
        step_number: Option<u32>,
        description: String,
        #[serde(default)]
        expected_result: Option<String>,
    },
}

impl From<RawTestCase> for TestCase {
    fn from(raw: RawTestCase) -> Self {
        let mut steps: Vec<Step> = raw
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| match step {
                RawStep::Text(description) => Step {
                    step_number: i as u32 + 1,
                    description,
                    expected_result: None,
                },
                RawStep::Full {
                    step_number,
                    description,
                    expected_result,
                } => Step {
                    step_number: step_number.unwrap_or(i as u32 + 1),
                    description,
                    expected_result,
                },
            })
            .collect();

        // A case-level expectation describes the end state of the case
        if let Some(expected) = raw.expected_result
            && let Some(last) = steps.last_mut()
            && last.expected_result.is_none()
        {
            last.expected_result = Some(expected);
        }

        TestCase {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            priority: raw.priority,
            steps,
        }
    }
}

/// Verdict for a single step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    /// No verdict could be reached; never counts as passed
    Unknown,
}

impl StepStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, StepStatus::Passed)
    }
}

/// What the verification oracle concluded and what evidence it used
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetail {
    pub valid: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checks_performed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

/// Outcome of executing one step
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub step_number: u32,
    pub description: String,
    pub status: StepStatus,
    /// Action kind that was executed (navigate, fill, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub parameters: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the action was resolved from the selector cache without the oracle
    #[serde(default)]
    pub from_cache: bool,
}

impl StepResult {
    pub fn new(step: &Step, status: StepStatus) -> Self {
        Self {
            step_number: step.step_number,
            description: step.description.clone(),
            status,
            action: None,
            parameters: serde_json::Value::Null,
            screenshot: None,
            validation: None,
            reasoning: None,
            error: None,
            from_cache: false,
        }
    }
}

/// Aggregate verdict for a test case
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCaseStatus {
    Passed,
    Failed,
}

/// Results of one test case within an execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub test_case_id: String,
    pub name: String,
    pub status: TestCaseStatus,
    pub steps: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseResult {
    /// Build a result whose status is derived from its steps
    pub fn from_steps(test_case: &TestCase, steps: Vec<StepResult>) -> Self {
        let all_passed = !steps.is_empty()
            && steps.len() == test_case.steps.len()
            && steps.iter().all(|s| s.status.is_passed());
        let error = steps
            .iter()
            .find(|s| !s.status.is_passed())
            .and_then(|s| s.error.clone().or_else(|| s.validation.as_ref().map(|v| v.reasoning.clone())));
        Self {
            test_case_id: test_case.id.clone(),
            name: test_case.name.clone(),
            status: if all_passed {
                TestCaseStatus::Passed
            } else {
                TestCaseStatus::Failed
            },
            steps,
            error: if all_passed { None } else { error },
        }
    }
}

/// In-memory record of a run, mutated only by its own task
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Vec<TestCaseResult>,
}

impl ExecutionRecord {
    pub fn pending(execution_id: &str) -> Self {
        Self {
            execution_id: execution_id.to_string(),
            status: ExecutionStatus::Pending,
            progress: 0,
            mode: None,
            started_at: None,
            completed_at: None,
            error: None,
            results: Vec::new(),
        }
    }

    /// Raise progress; lower values are ignored so progress never goes backwards
    pub fn advance(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
    }
}

/// Snapshot returned by `ExecutionManager::monitor`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionView {
    pub status: ExecutionStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ExecutionRecord> for ExecutionView {
    fn from(record: &ExecutionRecord) -> Self {
        Self {
            status: record.status,
            progress: record.progress,
            mode: record.mode,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error: record.error.clone(),
        }
    }
}

/// Pass/fail counts of a finished run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn of(results: &[TestCaseResult]) -> Self {
        let passed = results
            .iter()
            .filter(|r| r.status == TestCaseStatus::Passed)
            .count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
        }
    }
}

/// Persisted results document consumed by the reporting layer
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunResults {
    pub execution_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ExecutionMode>,
    pub test_results: Vec<TestCaseResult>,
    pub duration_secs: f64,
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
