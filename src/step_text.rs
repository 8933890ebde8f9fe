//! Heuristics over natural-language step text

use regex::{Regex, RegexBuilder};
use std::fmt;

lazy_static::lazy_static! {
    static ref EXPECTATION_PATTERNS: Vec<Regex> = [
        r"Verify\s+that\s+(.+?)(?:\.|$|,|\n)",
        r"Expected:\s*(.+?)(?:\.|$|,|\n)",
        r"Should\s+see\s+(.+?)(?:\.|$|,|\n)",
        r"Assert\s+that\s+(.+?)(?:\.|$|,|\n)",
        r"Check\s+that\s+(.+?)(?:\.|$|,|\n)",
        r"Ensure\s+that\s+(.+?)(?:\.|$|,|\n)",
        r"Confirm\s+that\s+(.+?)(?:\.|$|,|\n)",
    ]
    .iter()
    .map(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .expect("valid regex")
    })
    .collect();
    static ref EXPECTED_RESULT_SECTION: Regex =
        Regex::new(r"(?i)Expected\s+Result:?\s*([^\n]+)").expect("valid regex");
    static ref TRAILING_PUNCTUATION: Regex = Regex::new(r"[.,;:]+$").expect("valid regex");
    static ref LABELLED_SECRET: Regex =
        Regex::new(r"(?i)(?:secret\s+key|key)\s+([A-Z0-9]{20,})").expect("valid regex");
    static ref BARE_SECRET: Regex = Regex::new(r"\b([A-Z0-9]{20,})\b").expect("valid regex");
    static ref QUOTED: Regex =
        Regex::new(r#""([^"]*)"|“([^”]*)”|'([^']*)'"#).expect("valid regex");
    static ref URL: Regex = Regex::new(r#"https?://[^\s"'<>]+"#).expect("valid regex");
}

const ONE_TIME_CODE_KEYWORDS: &[&str] = &[
    "totp",
    "one-time",
    "one time",
    "2fa",
    "two-factor",
    "authenticator code",
    "security code",
];

const NAVIGATION_CLICK_KEYWORDS: &[&str] = &["sign in", "login", "submit", "next", "navigate", "go to"];

const SUBMIT_KEYWORDS: &[&str] = &[
    "submit", "verify", "continue", "sign in", "log in", "login", "confirm", "next",
];

/// What a step asks the browser to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Navigate,
    Fill,
    Click,
    Wait,
    GetText,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Navigate => "navigate",
            Verb::Fill => "fill",
            Verb::Click => "click",
            Verb::Wait => "wait_for",
            Verb::GetText => "get_text",
        }
    }

    /// Whether the verb acts on a page element (and so benefits from DOM context)
    pub fn targets_element(&self) -> bool {
        !matches!(self, Verb::Navigate)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

pub fn infer_verb(step: &str) -> Option<Verb> {
    let lower = step.to_lowercase();
    let has_url = URL.is_match(step);

    if has_url && contains_any(&lower, &["navigate", "go to", "open", "visit", "browse", "load"]) {
        return Some(Verb::Navigate);
    }
    if contains_any(&lower, &["enter ", "type ", "fill", "input ", "provide "]) {
        return Some(Verb::Fill);
    }
    if contains_any(&lower, &["click", "press ", "tap ", "submit", "select "]) {
        return Some(Verb::Click);
    }
    if lower.contains("wait") {
        return Some(Verb::Wait);
    }
    if contains_any(&lower, &["get text", "get the text", "read the", "retrieve"]) {
        return Some(Verb::GetText);
    }
    if has_url {
        return Some(Verb::Navigate);
    }
    None
}

/// Element type a step targets, used as the selector-cache key
pub fn infer_element_type(step: &str, verb: Verb) -> Option<&'static str> {
    let lower = step.to_lowercase();
    match verb {
        Verb::Fill => {
            if lower.contains("username") || lower.contains("email") {
                Some("username")
            } else if lower.contains("password") {
                Some("password")
            } else if contains_any(&lower, &["totp", "2fa", "two-factor", "authenticator", "one-time"])
                || (lower.contains("code") && lower.contains("security"))
            {
                Some("totp_code")
            } else if lower.contains("code") {
                Some("code")
            } else {
                None
            }
        }
        Verb::Click => {
            if lower.contains("submit") {
                Some("submit")
            } else if lower.contains("login") || lower.contains("log in") {
                Some("login_button")
            } else if lower.contains("continue") {
                Some("continue_button")
            } else {
                None
            }
        }
        Verb::Navigate | Verb::Wait | Verb::GetText => None,
    }
}

/// Expectation phrased inside the step text ("Verify that ...", "Expected: ...")
pub fn mine_expectation(step: &str) -> Option<String> {
    for pattern in EXPECTATION_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(step) {
            let found = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let found = TRAILING_PUNCTUATION.replace(found, "");
            if found.chars().count() > 5 {
                return Some(found.into_owned());
            }
        }
    }

    let section = EXPECTED_RESULT_SECTION
        .captures(step)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())?;
    (section.chars().count() > 5).then_some(section)
}

pub fn is_one_time_code_step(step: &str, text: Option<&str>) -> bool {
    let step = step.to_lowercase();
    let text = text.unwrap_or_default().to_lowercase();
    contains_any(&step, ONE_TIME_CODE_KEYWORDS) || contains_any(&text, ONE_TIME_CODE_KEYWORDS)
}

/// Shared secret embedded in the step ("secret key ABC..."), else the longest
/// long uppercase/digit token
pub fn extract_secret(step: &str) -> Option<String> {
    if let Some(caps) = LABELLED_SECRET.captures(step) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    BARE_SECRET
        .captures_iter(step)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .max_by_key(|s| s.len())
        .map(str::to_string)
}

/// First quoted literal in the step
pub fn quoted_text(step: &str) -> Option<String> {
    QUOTED.captures(step).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
    })
}

pub fn extract_url(step: &str) -> Option<String> {
    URL.find(step).map(|m| {
        m.as_str()
            .trim_end_matches(['.', ',', ';', ')', ']'])
            .to_string()
    })
}

/// Clicks that usually cause a page transition
pub fn is_navigation_click(step: &str) -> bool {
    contains_any(&step.to_lowercase(), NAVIGATION_CLICK_KEYWORDS)
}

/// Clicks that submit a form an earlier step filled
pub fn is_submit_click(step: &str) -> bool {
    contains_any(&step.to_lowercase(), SUBMIT_KEYWORDS)
}

/// Keywords recorded on a new page context
pub fn page_keywords(step: &str) -> Vec<String> {
    let lower = step.to_lowercase();
    let mut keywords = Vec::new();
    if lower.contains("login") {
        keywords.push("login");
    }
    if lower.contains("form") {
        keywords.push("form");
    }
    if lower.contains("username") || lower.contains("email") {
        keywords.push("username");
    }
    if lower.contains("password") {
        keywords.push("password");
    }
    if lower.contains("submit") {
        keywords.push("submit");
    }
    if contains_any(&lower, &["totp", "2fa", "one-time"]) {
        keywords.push("totp");
    }
    keywords.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
#[path = "step_text_test.rs"]
mod step_text_test;
