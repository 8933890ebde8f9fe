//! On-disk artifacts of a run: status records, results and generated test code

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Config;
use crate::errors::Result;
use crate::types::{ExecutionRecord, RunResults};

/// Filesystem layout for execution artifacts under one data directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    executions_dir: PathBuf,
    results_dir: PathBuf,
    generated_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &Config) -> Self {
        Self {
            executions_dir: config.executions_dir(),
            results_dir: config.results_dir(),
            generated_dir: config.generated_tests_dir(),
        }
    }

    pub fn status_path(&self, execution_id: &str) -> PathBuf {
        self.executions_dir
            .join(format!("{}_status.json", execution_id))
    }

    pub fn results_path(&self, execution_id: &str) -> PathBuf {
        self.results_dir
            .join(format!("execution_{}.json", execution_id))
    }

    pub fn generated_code_path(&self, execution_id: &str) -> PathBuf {
        self.generated_dir
            .join(format!("execution_{}", execution_id))
            .join("test.spec.js")
    }

    pub fn write_status(&self, record: &ExecutionRecord) -> Result<PathBuf> {
        let path = self.status_path(&record.execution_id);
        write_file(&path, &serde_json::to_string_pretty(record)?)?;
        debug!(
            "Saved status {:?} ({}%) for {}",
            record.status, record.progress, record.execution_id
        );
        Ok(path)
    }

    pub fn read_status(&self, execution_id: &str) -> Result<Option<ExecutionRecord>> {
        read_optional(&self.status_path(execution_id))
    }

    pub fn write_results(&self, results: &RunResults) -> Result<PathBuf> {
        let path = self.results_path(&results.execution_id);
        write_file(&path, &serde_json::to_string_pretty(results)?)?;
        debug!("Saved results for {} to {}", results.execution_id, path.display());
        Ok(path)
    }

    /// Persisted results of a finished run, `None` when there are none
    pub fn read_results(&self, execution_id: &str) -> Result<Option<RunResults>> {
        read_optional(&self.results_path(execution_id))
    }

    pub fn write_generated_code(&self, execution_id: &str, code: &str) -> Result<PathBuf> {
        let path = self.generated_code_path(execution_id);
        write_file(&path, code)?;
        Ok(path)
    }
}

fn write_file(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, body)?;
    Ok(())
}

fn read_optional<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;
