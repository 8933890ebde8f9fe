//! Time-based one-time codes for two-factor steps

use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::debug;

use crate::errors::{Result, StepwiseError};
use crate::step_text;

/// Produces the code to type into a one-time-code field
pub trait OneTimeCodeSource: Send + Sync {
    /// Code for a step, using a secret named in the step text when present
    fn code_for(&self, step: &str) -> Result<String>;
}

/// RFC 6238 generator (SHA-1, 6 digits, 30 s period)
#[derive(Debug, Clone, Default)]
pub struct TotpGenerator {
    fallback_secret: Option<String>,
}

impl TotpGenerator {
    pub fn new(fallback_secret: Option<String>) -> Self {
        Self {
            fallback_secret: fallback_secret.filter(|s| !s.trim().is_empty()),
        }
    }

    fn totp(secret_b32: &str) -> Result<TOTP> {
        let normalized: String = secret_b32
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '=')
            .collect::<String>()
            .to_uppercase();
        let bytes = Secret::Encoded(normalized).to_bytes().map_err(|e| {
            StepwiseError::Other(anyhow::anyhow!("invalid one-time-code secret: {:?}", e))
        })?;
        Ok(TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes))
    }

    /// Code for `secret_b32` at a given unix time
    pub fn code_at(secret_b32: &str, unix_secs: u64) -> Result<String> {
        Ok(Self::totp(secret_b32)?.generate(unix_secs))
    }

    fn secret_for(&self, step: &str) -> Result<String> {
        step_text::extract_secret(step)
            .or_else(|| self.fallback_secret.clone())
            .ok_or_else(|| {
                StepwiseError::Other(anyhow::anyhow!(
                    "no one-time-code secret in the step and none configured (TOTP_SECRET_KEY)"
                ))
            })
    }
}

impl OneTimeCodeSource for TotpGenerator {
    fn code_for(&self, step: &str) -> Result<String> {
        let secret = self.secret_for(step)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StepwiseError::Other(e.into()))?
            .as_secs();
        let code = Self::code_at(&secret, now)?;
        debug!("Generated one-time code {}...", &code[..3.min(code.len())]);
        Ok(code)
    }
}

#[cfg(test)]
#[path = "otp_test.rs"]
mod otp_test;
