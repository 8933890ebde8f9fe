// Unit tests for action parsing

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_parse_each_variant() {
    assert_eq!(
        Action::parse("navigate", &json!({"url": "https://app.example.com"})).unwrap(),
        Action::Navigate {
            url: "https://app.example.com".to_string()
        }
    );
    assert_eq!(
        Action::parse("Click", &json!({"selector": "#go"})).unwrap(),
        Action::Click {
            selector: "#go".to_string()
        }
    );
    assert_eq!(
        Action::parse("fill", &json!({"selector": "#u", "text": ""})).unwrap(),
        Action::Fill {
            selector: "#u".to_string(),
            text: String::new()
        }
    );
    assert_eq!(
        Action::parse("wait_for", &json!({"selector": ".ready", "timeout": 5000})).unwrap(),
        Action::WaitFor {
            selector: ".ready".to_string(),
            timeout_ms: Some(5000)
        }
    );
    assert_eq!(
        Action::parse("screenshot", &Value::Null).unwrap(),
        Action::Screenshot
    );
}

#[test]
fn test_fill_without_text_is_rejected() {
    let err = Action::parse("fill", &json!({"selector": "#u"})).unwrap_err();
    assert!(matches!(err, StepwiseError::Interpretation(_)));
    assert!(err.to_string().contains("'text'"));
}

#[test]
fn test_blank_selector_is_rejected() {
    let err = Action::parse("click", &json!({"selector": "   "})).unwrap_err();
    assert!(err.to_string().contains("'selector'"));
}

#[test]
fn test_unknown_action_is_rejected() {
    let err = Action::parse("hover", &json!({"selector": "#menu"})).unwrap_err();
    assert_eq!(err.exit_code(), 8);
    assert!(err.to_string().contains("unknown action 'hover'"));
    assert!(Action::parse("", &json!({})).is_err());
}

#[test]
fn test_parameters_round_back_to_same_action() {
    let action = Action::WaitFor {
        selector: "#spinner".to_string(),
        timeout_ms: None,
    };
    assert_eq!(action.parameters(), json!({"selector": "#spinner"}));
    assert_eq!(Action::parse(action.name(), &action.parameters()).unwrap(), action);
    assert_eq!(action.selector(), Some("#spinner"));
    assert_eq!(action.to_string(), "wait_for #spinner");
}
