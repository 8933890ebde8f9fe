use thiserror::Error;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, StepwiseError>;

/// Error taxonomy for the step engine, with exit codes for the CLI
#[derive(Debug, Error)]
pub enum StepwiseError {
    /// Bridge unreachable, timed out, or answered with a non-success HTTP status (exit code 4)
    #[error("Bridge transport failed at /{endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Bridge answered but reported that the action failed (exit code 6)
    #[error("Bridge action /{endpoint} failed: {message}")]
    RemoteAction { endpoint: String, message: String },

    /// Element never became present/visible (exit code 2)
    #[error("Element {selector} not found or not visible within {timeout_ms}ms")]
    ElementNotFound { selector: String, timeout_ms: u64 },

    /// Every strategy ran and none passed its post-condition (exit code 7)
    #[error("{operation} could not be verified: {}", attempts.join("; "))]
    Verification {
        operation: String,
        attempts: Vec<String>,
    },

    /// Oracle response was malformed or missing a required field (exit code 8)
    #[error("Interpretation error: {0}")]
    Interpretation(String),

    /// Screenshot artifact could not be located (exit code 9)
    #[error("Screenshot artifact not found for {0}")]
    Artifact(String),

    /// Selector registry file unreadable or corrupt
    #[error("Selector registry error for {domain}: {message}")]
    Registry { domain: String, message: String },

    /// Operation timeout (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic error (exit code 1)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StepwiseError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            StepwiseError::ElementNotFound { .. } => 2,
            StepwiseError::Transport { .. } => 4,
            StepwiseError::Timeout(_) => 5,
            StepwiseError::RemoteAction { .. } => 6,
            StepwiseError::Verification { .. } => 7,
            StepwiseError::Interpretation(_) => 8,
            StepwiseError::Artifact(_) => 9,
            StepwiseError::Registry { .. }
            | StepwiseError::Io(_)
            | StepwiseError::Json(_)
            | StepwiseError::Other(_) => 1,
        }
    }

    /// Whether this failure means the bridge itself is unusable
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StepwiseError::Transport { .. } | StepwiseError::Timeout(_)
        )
    }

    pub(crate) fn transport(endpoint: &str, message: impl Into<String>) -> Self {
        StepwiseError::Transport {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn remote(endpoint: &str, message: impl Into<String>) -> Self {
        StepwiseError::RemoteAction {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }
}

/// Map a CLI-level error chain back onto an exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StepwiseError>())
        .map(StepwiseError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
