//! Input-filling strategies and the attempt-until-verified combinator

use std::fmt;
use std::future::Future;

use crate::errors::Result;

/// Ways of getting text into a field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FillStrategy {
    /// focus + clear + bridge `/fill`
    Standard,
    /// native value setter with the synthetic event sequence
    ScriptedSetter,
    /// per-character scripted typing
    ScriptedKeystrokes,
    /// bridge `/type`
    RemoteType,
}

impl fmt::Display for FillStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FillStrategy::Standard => "standard fill",
            FillStrategy::ScriptedSetter => "scripted setter",
            FillStrategy::ScriptedKeystrokes => "scripted keystrokes",
            FillStrategy::RemoteType => "remote type",
        };
        f.write_str(name)
    }
}

const NORMAL_ORDER: [FillStrategy; 4] = [
    FillStrategy::Standard,
    FillStrategy::ScriptedSetter,
    FillStrategy::ScriptedKeystrokes,
    FillStrategy::RemoteType,
];

const ONE_TIME_CODE_ORDER: [FillStrategy; 4] = [
    FillStrategy::RemoteType,
    FillStrategy::ScriptedSetter,
    FillStrategy::ScriptedKeystrokes,
    FillStrategy::Standard,
];

/// Strategy order for a field
pub fn plan(is_one_time_code: bool) -> &'static [FillStrategy] {
    if is_one_time_code {
        &ONE_TIME_CODE_ORDER
    } else {
        &NORMAL_ORDER
    }
}

/// Result of one verified attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Verified,
    /// The action ran but the read-back did not match; carries what was seen
    Unverified(String),
}

/// Whether a read-back value satisfies the fill
pub fn value_matches(actual: &str, expected: &str, is_one_time_code: bool) -> bool {
    if is_one_time_code {
        let actual = actual.trim();
        let digits = expected.chars().filter(char::is_ascii_digit).count();
        !actual.is_empty()
            && actual.chars().count() == digits
            && actual.chars().all(|c| c.is_ascii_digit())
    } else {
        !actual.is_empty() && actual.contains(expected)
    }
}

/// Run `attempt` for each strategy in order until one verifies.
///
/// Returns the winning strategy, or one line per failed attempt.
pub async fn first_verified<S, F, Fut>(
    strategies: &[S],
    mut attempt: F,
) -> std::result::Result<S, Vec<String>>
where
    S: Copy + fmt::Display,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Result<Outcome>>,
{
    let mut failures = Vec::with_capacity(strategies.len());
    for &strategy in strategies {
        match attempt(strategy).await {
            Ok(Outcome::Verified) => return Ok(strategy),
            Ok(Outcome::Unverified(seen)) => {
                failures.push(format!("{}: read back '{}'", strategy, seen))
            }
            Err(e) => failures.push(format!("{}: {}", strategy, e)),
        }
    }
    Err(failures)
}

#[cfg(test)]
#[path = "fill_test.rs"]
mod fill_test;
