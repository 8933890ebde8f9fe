// Unit tests for artifact persistence

use super::*;
use crate::types::{ExecutionMode, ExecutionStatus, RunSummary};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn store(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::new(&Config::with_data_dir(dir.path()))
}

#[test]
fn test_layout_under_data_dir() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert_eq!(
        store.status_path("abc"),
        dir.path().join("data/executions/abc_status.json")
    );
    assert_eq!(
        store.results_path("abc"),
        dir.path().join("data/results/execution_abc.json")
    );
    assert_eq!(
        store.generated_code_path("abc"),
        dir.path().join("generated_tests/execution_abc/test.spec.js")
    );
}

#[test]
fn test_status_is_overwritten_per_transition() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let mut record = ExecutionRecord::pending("run1");
    store.write_status(&record).unwrap();

    record.status = ExecutionStatus::Running;
    record.advance(40);
    store.write_status(&record).unwrap();

    let saved = store.read_status("run1").unwrap().unwrap();
    assert_eq!(saved.status, ExecutionStatus::Running);
    assert_eq!(saved.progress, 40);
}

#[test]
fn test_results_round_trip_and_absence() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    assert!(store.read_results("run1").unwrap().is_none());

    let results = RunResults {
        execution_id: "run1".to_string(),
        status: ExecutionStatus::Completed,
        mode: Some(ExecutionMode::Bridge),
        test_results: Vec::new(),
        duration_secs: 1.5,
        summary: RunSummary::default(),
        error: None,
    };
    store.write_results(&results).unwrap();

    let text = std::fs::read_to_string(store.results_path("run1")).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(raw["mode"], "bridge");
    assert_eq!(raw["summary"]["total"], 0);

    let loaded = store.read_results("run1").unwrap().unwrap();
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert_eq!(loaded.duration_secs, 1.5);
}

#[test]
fn test_corrupt_results_are_an_error() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let path = store.results_path("bad");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{").unwrap();
    assert!(store.read_results("bad").is_err());
}

#[test]
fn test_generated_code_is_written() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    let path = store
        .write_generated_code("run1", "test('x', async () => {});")
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(path).unwrap(),
        "test('x', async () => {});"
    );
}
