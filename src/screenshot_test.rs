// Unit tests for screenshot paths and artifact resolution

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_sanitize_description() {
    assert_eq!(
        sanitize_description("Navigate to https://app.example.com/login"),
        "navigate_to_httpsappexamplecomlogin"
    );
    assert_eq!(sanitize_description("Click 'Sign In' -- now!"), "click_sign_in_now");
    assert_eq!(sanitize_description("  leading and trailing  "), "leading_and_trailing");

    let long = "word ".repeat(30);
    assert!(sanitize_description(&long).chars().count() <= 50);
}

#[test]
fn test_step_and_error_paths() {
    let base = Path::new("/data/screenshots");
    assert_eq!(
        step_path(base, "abc", "001", 3, "Enter username"),
        PathBuf::from("/data/screenshots/execution_abc/TC001/step_03_enter_username.png")
    );
    assert_eq!(
        error_path(base, "abc", "001", 12),
        PathBuf::from("/data/screenshots/execution_abc/TC001/error_step_12.png")
    );
}

#[test]
fn test_reported_path_parsing() {
    let items = vec![json!({
        "type": "text",
        "text": "Screenshot saved to: ../../../home/user/Downloads/step_01-2025.png\nmore"
    })];
    assert_eq!(
        reported_path(&items),
        Some(PathBuf::from("/home/user/Downloads/step_01-2025.png"))
    );

    let not_png = vec![json!({"type": "text", "text": "Screenshot saved to: /tmp/file.jpg"})];
    assert_eq!(reported_path(&not_png), None);
    assert_eq!(reported_path(&[json!({"type": "text", "text": "done"})]), None);
}

#[test]
fn test_inline_image_decoding() {
    let items = vec![
        json!({"type": "text", "text": "captured"}),
        json!({"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"}),
    ];
    assert_eq!(inline_image(&items), Some(b"hello".to_vec()));
    assert_eq!(inline_image(&items[..1]), None);
}

#[test]
fn test_find_recent_prefers_named_capture() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("other-1.png"), b"x").unwrap();
    std::fs::write(dir.path().join("step_01_open-2025.png"), b"x").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

    let found = find_recent(
        dir.path(),
        "step_01_open",
        Duration::from_secs(300),
        Duration::from_secs(120),
    );
    assert_eq!(found, Some(dir.path().join("step_01_open-2025.png")));
}

#[test]
fn test_find_recent_falls_back_to_any_png() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("something.png"), b"x").unwrap();

    let found = find_recent(
        dir.path(),
        "step_02",
        Duration::from_secs(300),
        Duration::from_secs(120),
    );
    assert_eq!(found, Some(dir.path().join("something.png")));

    let stale = find_recent(dir.path(), "step_02", Duration::ZERO, Duration::ZERO);
    assert_eq!(stale, None);
}

#[test]
fn test_list_case_captures() {
    let dir = TempDir::new().unwrap();
    let case = case_dir(dir.path(), "e1", "7");
    std::fs::create_dir_all(&case).unwrap();
    std::fs::write(case.join("step_02_b.png"), b"x").unwrap();
    std::fs::write(case.join("step_01_a.png"), b"x").unwrap();

    let found = list_case_captures(dir.path(), "e1", "7");
    assert_eq!(found, vec![case.join("step_01_a.png"), case.join("step_02_b.png")]);
    assert!(list_case_captures(dir.path(), "e1", "8").is_empty());
}
