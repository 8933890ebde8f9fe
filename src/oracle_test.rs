// Unit tests for oracle response parsing

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_strip_code_fences() {
    assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
    assert_eq!(strip_code_fences("  {\"plain\": true} "), "{\"plain\": true}");
}

#[test]
fn test_parse_interpretation() {
    let parsed = parse_interpretation(
        r##"```json
{"action": "fill", "parameters": {"selector": "#email", "text": "a@b.c"}, "reasoning": "email field"}
```"##,
    )
    .unwrap();
    assert_eq!(parsed.action, "fill");
    assert_eq!(parsed.parameters["selector"], "#email");
    assert_eq!(parsed.reasoning.as_deref(), Some("email field"));
}

#[test]
fn test_interpretation_without_action_is_malformed() {
    let err = parse_interpretation(r#"{"parameters": {}}"#).unwrap_err();
    assert!(matches!(err, StepwiseError::Interpretation(_)));
}

#[test]
fn test_validation_requires_explicit_boolean() {
    assert!(parse_validation(r#"{"reasoning": "looks fine"}"#).is_err());
    assert!(parse_validation(r#"{"valid": "true"}"#).is_err());
    assert!(parse_validation("not json").is_err());

    let ok = parse_validation(r#"{"valid": false, "reasoning": "still on login"}"#).unwrap();
    assert!(!ok.valid);
    assert!(ok.checks_needed.is_empty());
}

#[test]
fn test_validation_checks_parsed() {
    let parsed = parse_validation(
        r#"{
            "valid": true,
            "checks_needed": [
                {"tool": "evaluate", "code_or_selector": "window.location.href", "purpose": "url"},
                {"tool": "get_dom"}
            ],
            "evidence": {"url": "https://x"}
        }"#,
    )
    .unwrap();
    assert_eq!(parsed.checks_needed.len(), 2);
    assert_eq!(parsed.checks_needed[1].code_or_selector, "");
    assert_eq!(parsed.evidence, Some(json!({"url": "https://x"})));
}

#[test]
fn test_requests_omit_absent_fields() {
    let request = InterpretRequest {
        step_description: "Click login".to_string(),
        selector_hint: Some("#login".to_string()),
        ..Default::default()
    };
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({"step_description": "Click login", "selector_hint": "#login"})
    );
}
