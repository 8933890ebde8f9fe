//! # stepwise
//!
//! Natural-language browser test steps, executed and verified through a
//! remote browser-automation bridge.
//!
//! Each step ("Enter the username", "Click Sign In", "Verify the dashboard
//! loads") is interpreted into a concrete action by an oracle, executed
//! against the bridge with post-condition checks, captured as a screenshot and
//! judged by the oracle. Selectors that worked are remembered per domain and
//! page, so later runs resolve the same steps without asking the oracle.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run generated test cases against the bridge (falls back to `npx playwright test`)
//! stepwise run --tests cases.json --code generated.spec.js
//!
//! # Poll a run
//! stepwise status 4b1c...
//!
//! # Inspect the selector cache
//! stepwise registry lookup "https://app.example.com/login" "Enter the username"
//! stepwise registry show app.example.com
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use stepwise::{Config, ExecutionManager, RunRegistry, TestCase};
//!
//! # async fn example(test_cases: Vec<TestCase>) -> anyhow::Result<()> {
//! let manager = ExecutionManager::new(Config::default(), RunRegistry::new());
//! let handle = manager.start_execution("", "run-1", test_cases);
//! handle.await?;
//! println!("{:?}", manager.monitor("run-1"));
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

/// Closed set of browser actions a step resolves to
pub mod action;

/// Verified browser operations over the bridge
pub mod automation;

/// Bridge wire format and transport
pub mod bridge;

/// Runtime configuration and timing knobs
pub mod config;

/// Error taxonomy and exit codes
pub mod errors;

/// Per-step interpret/act/capture/verify/learn loop
pub mod executor;

/// Fill strategies and their verification
pub mod fill;

/// Run lifecycle and status tracking
pub mod manager;

/// Interpretation and verification oracle
pub mod oracle;

/// One-time codes for two-factor steps
pub mod otp;

/// Learned selectors per domain and page
pub mod registry;

/// Local test-runner fallback
pub mod runner;

/// Screenshot naming and artifact resolution
pub mod screenshot;

/// In-page scripts sent through the bridge evaluator
pub mod script;

/// Heuristics over natural-language step text
pub mod step_text;

/// Status, results and generated-code files
pub mod store;

/// Test cases, results and execution records
pub mod types;

#[cfg(test)]
mod test_support;

pub use action::Action;
pub use automation::{AutomationClient, Capture};
pub use bridge::{BridgeReply, BridgeTransport, HttpBridge};
pub use config::{ClientSettings, Config};
pub use errors::{Result, StepwiseError};
pub use executor::{CaseContext, StepExecutor};
pub use fill::FillStrategy;
pub use manager::{ExecutionManager, RunRegistry};
pub use oracle::{HttpOracle, Oracle};
pub use otp::{OneTimeCodeSource, TotpGenerator};
pub use registry::SelectorRegistry;
pub use types::{
    ExecutionMode, ExecutionRecord, ExecutionStatus, ExecutionView, RunResults, RunSummary, Step,
    StepResult, StepStatus, TestCase, TestCaseResult, TestCaseStatus,
};
