// Unit tests for CLI argument handling

use super::*;
use crate::commands::run::parse_test_cases;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn globals() -> GlobalArgs {
    GlobalArgs {
        bridge_url: None,
        oracle_url: None,
        data_dir: None,
        totp_secret: None,
        runner: None,
    }
}

#[test]
fn test_flags_override_defaults() {
    let config = config_from(&GlobalArgs {
        bridge_url: Some("http://bridge:9000".to_string()),
        oracle_url: Some("http://oracle:7000".to_string()),
        data_dir: Some(PathBuf::from("/tmp/stepwise-data")),
        totp_secret: Some("GEZDGNBVGY3TQOJQ".to_string()),
        runner: Some("  pnpm exec playwright test ".to_string()),
    });
    assert_eq!(config.bridge_url, "http://bridge:9000");
    assert_eq!(config.oracle_url, "http://oracle:7000");
    assert_eq!(
        config.selectors_dir(),
        PathBuf::from("/tmp/stepwise-data/data/selectors")
    );
    assert_eq!(config.totp_secret.as_deref(), Some("GEZDGNBVGY3TQOJQ"));
    assert_eq!(
        config.runner_command,
        vec!["pnpm", "exec", "playwright", "test"]
    );
}

#[test]
fn test_blank_runner_keeps_default() {
    let config = config_from(&GlobalArgs {
        runner: Some("   ".to_string()),
        ..globals()
    });
    assert_eq!(config.runner_command, vec!["npx", "playwright", "test"]);
}

#[test]
fn test_test_case_files() {
    let list = parse_test_cases(
        r#"[{"id": "001", "name": "Login", "steps": ["Open https://app.example.com", "Click Sign In"]}]"#,
    )
    .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].steps[1].step_number, 2);

    let document = parse_test_cases(
        r#"{"execution_id": "x", "test_cases": [{"id": "002", "steps": [{"step_number": 1, "description": "Open app"}]}]}"#,
    )
    .unwrap();
    assert_eq!(document[0].id, "002");
    assert_eq!(document[0].name, "002");

    assert!(parse_test_cases("[]").is_err());
    assert!(parse_test_cases(r#"{"cases": []}"#).is_err());
}
