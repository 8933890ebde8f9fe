//! Runtime configuration and timing knobs

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BRIDGE_URL: &str = "http://localhost:3001";
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:8080";

/// Timeouts, delays and thresholds used by the automation client.
///
/// Every value is injectable so tests can run the client against a fake bridge
/// without real sleeps.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Bound for `GET /health` before connecting
    pub health_timeout: Duration,
    /// Bound for the `POST /connect` handshake
    pub connect_timeout: Duration,
    /// Default bound for every other bridge call
    pub call_timeout: Duration,
    pub disconnect_timeout: Duration,
    /// How long `click` waits for its target to appear (ms, sent to the bridge)
    pub click_wait_ms: u64,
    /// Timeout handed to the remote evaluator (ms)
    pub evaluate_timeout_ms: u64,
    /// Page readiness budget on the first screenshot attempt (ms)
    pub ready_timeout_ms: u64,
    /// Extra readiness budget added per screenshot retry (ms)
    pub ready_timeout_step_ms: u64,
    /// Pause after a successful readiness check so late rendering lands
    pub settle_delay: Duration,
    /// Pause used instead of readiness polling when the check itself fails
    pub ready_fallback_delay: Duration,
    /// Pause between focusing/clearing and filling a field
    pub input_delay: Duration,
    /// Pause between a fill strategy and its read-back verification
    pub fill_verify_delay: Duration,
    /// Pause after clicks that usually trigger navigation (sign in, submit, next)
    pub navigation_click_settle: Duration,
    /// Pause after any other click
    pub click_settle: Duration,
    /// Pause before capturing a step's screenshot
    pub capture_delay: Duration,
    /// Timeout for a `wait_for` step when the interpretation gives none (ms)
    pub wait_step_timeout_ms: u64,
    /// Timeout for presence checks requested during verification (ms)
    pub check_wait_ms: u64,
    /// Captures smaller than this are treated as blank
    pub screenshot_min_bytes: u64,
    /// Capture attempts before a blank-looking screenshot is accepted
    pub screenshot_attempts: u32,
    pub screenshot_retry_delay: Duration,
    /// Directory where the bridge drops captures it could not place itself
    pub artifact_fallback_dir: Option<PathBuf>,
    /// How long to keep polling the fallback directory for a capture
    pub artifact_search_window: Duration,
    pub artifact_poll_interval: Duration,
    /// Files named after the capture are accepted when younger than this
    pub artifact_recent_named: Duration,
    /// Any png is accepted as the capture when younger than this
    pub artifact_recent_any: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            health_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            call_timeout: Duration::from_secs(180),
            disconnect_timeout: Duration::from_secs(5),
            click_wait_ms: 10_000,
            evaluate_timeout_ms: 30_000,
            ready_timeout_ms: 15_000,
            ready_timeout_step_ms: 5_000,
            settle_delay: Duration::from_millis(1500),
            ready_fallback_delay: Duration::from_secs(3),
            input_delay: Duration::from_millis(200),
            fill_verify_delay: Duration::from_millis(800),
            navigation_click_settle: Duration::from_secs(3),
            click_settle: Duration::from_secs(1),
            capture_delay: Duration::from_millis(2500),
            wait_step_timeout_ms: 30_000,
            check_wait_ms: 5_000,
            screenshot_min_bytes: 10 * 1024,
            screenshot_attempts: 2,
            screenshot_retry_delay: Duration::from_secs(2),
            artifact_fallback_dir: dirs::download_dir()
                .or_else(|| dirs::home_dir().map(|home| home.join("Downloads"))),
            artifact_search_window: Duration::from_secs(5),
            artifact_poll_interval: Duration::from_millis(500),
            artifact_recent_named: Duration::from_secs(300),
            artifact_recent_any: Duration::from_secs(120),
        }
    }
}

impl ClientSettings {
    /// Same bounds as the defaults but with every pause removed
    pub fn without_delays() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            ready_fallback_delay: Duration::ZERO,
            input_delay: Duration::ZERO,
            fill_verify_delay: Duration::ZERO,
            navigation_click_settle: Duration::ZERO,
            click_settle: Duration::ZERO,
            capture_delay: Duration::ZERO,
            screenshot_retry_delay: Duration::ZERO,
            artifact_fallback_dir: None,
            artifact_search_window: Duration::ZERO,
            artifact_poll_interval: Duration::from_millis(10),
            ..Self::default()
        }
    }
}

/// Top-level configuration shared by the manager and the CLI
#[derive(Debug, Clone)]
pub struct Config {
    pub bridge_url: String,
    pub oracle_url: String,
    /// Root for selectors, results, status files, screenshots and generated code
    pub data_dir: PathBuf,
    /// Shared secret for one-time codes when a step does not carry its own
    pub totp_secret: Option<String>,
    /// Local runner used when the bridge is unavailable; the generated test file path is appended
    pub runner_command: Vec<String>,
    pub runner_timeout: Duration,
    /// Upper bound on establishing the bridge session before falling back
    pub bridge_connect_bound: Duration,
    pub client: ClientSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_url: DEFAULT_BRIDGE_URL.to_string(),
            oracle_url: DEFAULT_ORACLE_URL.to_string(),
            data_dir: default_data_dir(),
            totp_secret: None,
            runner_command: vec![
                "npx".to_string(),
                "playwright".to_string(),
                "test".to_string(),
            ],
            runner_timeout: Duration::from_secs(300),
            bridge_connect_bound: Duration::from_secs(30),
            client: ClientSettings::default(),
        }
    }
}

impl Config {
    /// Configuration rooted at `data_dir` with default everything else
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn selectors_dir(&self) -> PathBuf {
        self.data_dir.join("data").join("selectors")
    }

    pub fn executions_dir(&self) -> PathBuf {
        self.data_dir.join("data").join("executions")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("data").join("results")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.data_dir.join("screenshots")
    }

    pub fn generated_tests_dir(&self) -> PathBuf {
        self.data_dir.join("generated_tests")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".stepwise"))
        .unwrap_or_else(|| PathBuf::from(".stepwise"))
}
