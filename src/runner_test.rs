// Unit tests for the local runner

use super::*;
use pretty_assertions::assert_eq;
use std::time::Instant;

fn sh(script: &str, timeout: Duration) -> FallbackRunner {
    FallbackRunner::new(
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        timeout,
    )
}

#[cfg(unix)]
#[tokio::test]
async fn test_exit_status_is_reported() {
    let passed = sh("echo ran; exit 0", Duration::from_secs(10))
        .run(Path::new("test.spec.js"))
        .await
        .unwrap();
    assert!(passed.success);
    assert_eq!(passed.exit_code, Some(0));
    assert_eq!(passed.output.trim(), "ran");

    let failed = sh("exit 3", Duration::from_secs(10))
        .run(Path::new("test.spec.js"))
        .await
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.exit_code, Some(3));
    assert!(!failed.timed_out);
}

#[cfg(unix)]
#[tokio::test]
async fn test_timeout_kills_runner() {
    let started = Instant::now();
    let outcome = sh("sleep 30", Duration::from_millis(200))
        .run(Path::new("test.spec.js"))
        .await
        .unwrap();
    assert!(outcome.timed_out);
    assert!(!outcome.success);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_empty_or_missing_command_is_an_error() {
    let empty = FallbackRunner::new(Vec::new(), Duration::from_secs(1));
    assert!(empty.run(Path::new("x")).await.is_err());

    let missing = FallbackRunner::new(
        vec!["definitely-not-a-runner-binary".to_string()],
        Duration::from_secs(1),
    );
    assert!(missing.run(Path::new("x")).await.is_err());
}

#[test]
fn test_tail_keeps_the_end() {
    assert_eq!(tail("abcdef", 3), "def");
    assert_eq!(tail("ab", 3), "ab");
}
