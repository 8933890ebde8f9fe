use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use stepwise::store::ArtifactStore;
use stepwise::{Config, ExecutionManager, ExecutionStatus, RunRegistry, TestCase};

const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Test-case files are either a bare list or the `{"test_cases": [...]}` document
#[derive(Deserialize)]
#[serde(untagged)]
enum TestCaseFile {
    List(Vec<TestCase>),
    Document { test_cases: Vec<TestCase> },
}

pub fn parse_test_cases(text: &str) -> Result<Vec<TestCase>> {
    let parsed: TestCaseFile =
        serde_json::from_str(text).context("Test case file is not a list of test cases")?;
    let test_cases = match parsed {
        TestCaseFile::List(test_cases) | TestCaseFile::Document { test_cases } => test_cases,
    };
    if test_cases.is_empty() {
        bail!("Test case file contains no test cases");
    }
    Ok(test_cases)
}

/// Run to completion and print the results document; returns whether every case passed
pub async fn handle_run(
    config: Config,
    tests: PathBuf,
    code: Option<PathBuf>,
    execution_id: Option<String>,
) -> Result<bool> {
    let text = std::fs::read_to_string(&tests)
        .with_context(|| format!("Failed to read {}", tests.display()))?;
    let test_cases = parse_test_cases(&text)?;
    let code = match code {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };
    let execution_id = execution_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let store = ArtifactStore::new(&config);
    let manager = ExecutionManager::new(config, RunRegistry::new());
    let mut handle = manager.start_execution(&code, &execution_id, test_cases);

    let mut ticker = tokio::time::interval(PROGRESS_LOG_INTERVAL);
    loop {
        tokio::select! {
            joined = &mut handle => {
                joined.context("Execution task panicked")?;
                break;
            }
            _ = ticker.tick() => {
                if let Some(view) = manager.monitor(&execution_id) {
                    info!("Execution {}: {:?} ({}%)", execution_id, view.status, view.progress);
                }
            }
        }
    }

    if let Some(record) = manager.record(&execution_id)
        && record.status == ExecutionStatus::Failed
    {
        bail!(
            "Execution {} failed: {}",
            execution_id,
            record.error.unwrap_or_default()
        );
    }

    let results = store
        .read_results(&execution_id)?
        .with_context(|| format!("No results were saved for execution {}", execution_id))?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(results.summary.failed == 0)
}
