// Unit tests for fill strategies

use super::*;
use crate::errors::StepwiseError;
use pretty_assertions::assert_eq;
use std::sync::Mutex;

#[test]
fn test_plan_orders() {
    assert_eq!(
        plan(false),
        &[
            FillStrategy::Standard,
            FillStrategy::ScriptedSetter,
            FillStrategy::ScriptedKeystrokes,
            FillStrategy::RemoteType
        ]
    );
    assert_eq!(plan(true)[0], FillStrategy::RemoteType);
    assert_eq!(plan(true)[3], FillStrategy::Standard);
}

#[test]
fn test_value_matches() {
    assert!(value_matches("alice@example.com", "alice@example.com", false));
    assert!(value_matches("  alice ", "alice", false));
    assert!(!value_matches("", "alice", false));
    assert!(!value_matches("bob", "alice", false));

    assert!(value_matches("123456", "123456", true));
    assert!(value_matches(" 654321 ", "123456", true));
    assert!(!value_matches("12345", "123456", true));
    assert!(!value_matches("12a456", "123456", true));
    assert!(!value_matches("1234567", "123456", true));
}

#[tokio::test]
async fn test_first_verified_stops_at_first_success() {
    let tried = Mutex::new(Vec::new());
    let winner = first_verified(plan(false), |s| {
        tried.lock().unwrap().push(s);
        async move {
            match s {
                FillStrategy::Standard => Ok(Outcome::Unverified(String::new())),
                FillStrategy::ScriptedSetter => Err(StepwiseError::remote("evaluate", "boom")),
                _ => Ok(Outcome::Verified),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(winner, FillStrategy::ScriptedKeystrokes);
    assert_eq!(
        *tried.lock().unwrap(),
        vec![
            FillStrategy::Standard,
            FillStrategy::ScriptedSetter,
            FillStrategy::ScriptedKeystrokes
        ]
    );
}

#[tokio::test]
async fn test_first_verified_collects_every_failure() {
    let failures = first_verified(plan(true), |_| async {
        Ok::<_, StepwiseError>(Outcome::Unverified("000".to_string()))
    })
    .await
    .unwrap_err();

    assert_eq!(failures.len(), 4);
    assert_eq!(failures[0], "remote type: read back '000'");
    assert!(failures[3].starts_with("standard fill"));
}
