//! Local test-runner subprocess used when the bridge is unavailable

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const OUTPUT_TAIL_CHARS: usize = 4000;

/// What the runner process reported
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerOutcome {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Tail of stdout followed by stderr
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct FallbackRunner {
    command: Vec<String>,
    timeout: Duration,
}

impl FallbackRunner {
    /// `command` is the program and its leading arguments; the generated test file is appended
    pub fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub async fn run(&self, test_file: &Path) -> Result<RunnerOutcome> {
        let (program, args) = self
            .command
            .split_first()
            .context("Local test runner command is empty")?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(test_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so a timeout takes down everything the runner started
        #[cfg(unix)]
        cmd.process_group(0);

        info!(
            "Running {} {} {}",
            program,
            args.join(" "),
            test_file.display()
        );
        let child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", program))?;
        let pid = child.id();

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.with_context(|| format!("Failed to wait for {}", program))?;
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                debug!("Runner output:\n{}", text);
                Ok(RunnerOutcome {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    timed_out: false,
                    output: tail(&text, OUTPUT_TAIL_CHARS),
                })
            }
            Err(_) => {
                warn!("Test runner exceeded {:?}, killing it", self.timeout);
                if let Some(pid) = pid {
                    kill_process_group(pid).await;
                }
                Ok(RunnerOutcome {
                    success: false,
                    exit_code: None,
                    timed_out: true,
                    output: String::new(),
                })
            }
        }
    }
}

#[cfg(unix)]
async fn kill_process_group(pgid: u32) {
    if let Err(e) = Command::new("kill")
        .arg("-KILL")
        .arg(format!("-{}", pgid))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        debug!("Failed to kill process group {}: {}", pgid, e);
    }
}

#[cfg(not(unix))]
async fn kill_process_group(_pgid: u32) {}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(max_chars)).collect()
}

#[cfg(test)]
#[path = "runner_test.rs"]
mod runner_test;
