//! Screenshot paths and capture-artifact resolution.
//!
//! The bridge does not always put a capture where it was asked to. It may
//! report where it saved the file, return the image inline, or drop a
//! timestamped file into a well-known directory. The helpers here cover all three.

use base64::Engine;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::bridge::item_text;

lazy_static::lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w\s-]").expect("valid regex");
    static ref SEPARATOR_RUNS: Regex = Regex::new(r"[-\s]+").expect("valid regex");
}

const MAX_DESCRIPTION_LEN: usize = 50;

/// Turn a step description into a filename fragment
pub fn sanitize_description(description: &str) -> String {
    let cleaned = NON_WORD.replace_all(description, "");
    let joined = SEPARATOR_RUNS.replace_all(&cleaned, "_").to_lowercase();
    let truncated: String = joined.chars().take(MAX_DESCRIPTION_LEN).collect();
    truncated.trim_matches('_').to_string()
}

/// Directory holding every capture of one test case
pub fn case_dir(base: &Path, execution_id: &str, test_case_id: &str) -> PathBuf {
    base.join(format!("execution_{}", execution_id))
        .join(format!("TC{}", test_case_id))
}

pub fn step_path(
    base: &Path,
    execution_id: &str,
    test_case_id: &str,
    step_number: u32,
    description: &str,
) -> PathBuf {
    case_dir(base, execution_id, test_case_id).join(format!(
        "step_{:02}_{}.png",
        step_number,
        sanitize_description(description)
    ))
}

pub fn error_path(base: &Path, execution_id: &str, test_case_id: &str, step_number: u32) -> PathBuf {
    case_dir(base, execution_id, test_case_id).join(format!("error_step_{:02}.png", step_number))
}

/// Captures already present for a test case, sorted by name
pub fn list_case_captures(base: &Path, execution_id: &str, test_case_id: &str) -> Vec<PathBuf> {
    let dir = case_dir(base, execution_id, test_case_id);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .collect();
    found.sort();
    found
}

/// Path announced in a bridge reply (`... saved to: <path>`), if it names a png
pub fn reported_path(items: &[Value]) -> Option<PathBuf> {
    items.iter().find_map(|item| {
        let text = item_text(item);
        let idx = text
            .rfind("saved to:")
            .or_else(|| text.rfind("Saved to:"))?;
        let rest = text[idx + "saved to:".len()..].trim();
        let candidate = rest.lines().next()?.split(' ').next()?;
        let candidate = if let Some(stripped) = candidate.strip_prefix("../../../") {
            format!("/{}", stripped)
        } else if let Some(stripped) = candidate.strip_prefix("../") {
            format!("/{}", stripped)
        } else {
            candidate.to_string()
        };
        candidate.ends_with(".png").then(|| PathBuf::from(candidate))
    })
}

/// Decoded bytes of the first inline image item
pub fn inline_image(items: &[Value]) -> Option<Vec<u8>> {
    items.iter().find_map(|item| {
        if item.get("type").and_then(Value::as_str) != Some("image") {
            return None;
        }
        let data = item.get("data").and_then(Value::as_str)?;
        base64::engine::general_purpose::STANDARD.decode(data).ok()
    })
}

fn age(path: &Path, now: SystemTime) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(now.duration_since(modified).unwrap_or(Duration::ZERO))
}

/// Newest capture in `dir` named `<stem>-*.png` within `named_window`,
/// else the newest `*.png` within `any_window`
pub fn find_recent(
    dir: &Path,
    stem: &str,
    named_window: Duration,
    any_window: Duration,
) -> Option<PathBuf> {
    let now = SystemTime::now();
    let entries = std::fs::read_dir(dir).ok()?;
    let pngs: Vec<(PathBuf, Duration)> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
        .filter_map(|path| age(&path, now).map(|a| (path, a)))
        .collect();

    let prefix = format!("{}-", stem);
    let named = pngs
        .iter()
        .filter(|(path, age)| {
            *age < named_window
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
        })
        .min_by_key(|(_, age)| *age);
    if let Some((path, _)) = named {
        return Some(path.clone());
    }

    pngs.into_iter()
        .min_by_key(|(_, age)| *age)
        .filter(|(_, age)| *age < any_window)
        .map(|(path, _)| path)
}

#[cfg(test)]
#[path = "screenshot_test.rs"]
mod screenshot_test;
