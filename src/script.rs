//! Page scripts sent through the bridge's `evaluate` endpoint, and the
//! parsing of what comes back.

use serde_json::Value;

use crate::bridge::item_text;

/// Descriptive items the bridge interleaves with evaluation output
const LABELS: &[&str] = &[
    "Executed JavaScript:",
    "Executed:",
    "Result:",
    "JavaScript executed",
];

/// Escape a CSS selector for a single-quoted JS string
pub fn escape_selector(selector: &str) -> String {
    selector.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Escape arbitrary text for a single-quoted JS string
pub fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

pub fn focus(selector: &str) -> String {
    format!("document.querySelector('{}')?.focus()", escape_selector(selector))
}

pub fn clear(selector: &str) -> String {
    format!(
        "(function() {{ const el = document.querySelector('{}'); if (el) {{ el.select(); el.value = ''; }} }})()",
        escape_selector(selector)
    )
}

/// Read back the current value of a field, empty when absent
pub fn read_value(selector: &str) -> String {
    format!(
        "document.querySelector('{}')?.value || ''",
        escape_selector(selector)
    )
}

/// Set the value through the native setter and replay the events a user would produce
pub fn native_setter_fill(selector: &str, text: &str) -> String {
    format!(
        r#"(function() {{
    const el = document.querySelector('{sel}');
    if (!el) {{ return false; }}
    const value = '{text}';
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    el.focus();
    el.dispatchEvent(new FocusEvent('focus', {{ bubbles: true }}));
    el.dispatchEvent(new CompositionEvent('compositionstart', {{ bubbles: true }}));
    setter.call(el, value);
    el.dispatchEvent(new CompositionEvent('compositionend', {{ bubbles: true, data: value }}));
    el.dispatchEvent(new InputEvent('input', {{ bubbles: true, data: value, inputType: 'insertText' }}));
    for (const ch of value) {{
        el.dispatchEvent(new KeyboardEvent('keydown', {{ bubbles: true, key: ch }}));
        el.dispatchEvent(new KeyboardEvent('keypress', {{ bubbles: true, key: ch }}));
        el.dispatchEvent(new KeyboardEvent('keyup', {{ bubbles: true, key: ch }}));
    }}
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    el.dispatchEvent(new FocusEvent('blur', {{ bubbles: true }}));
    return true;
}})()"#,
        sel = escape_selector(selector),
        text = escape_text(text),
    )
}

/// Type one character at a time, firing key and input events for each
pub fn keystroke_fill(selector: &str, text: &str) -> String {
    format!(
        r#"(function() {{
    const el = document.querySelector('{sel}');
    if (!el) {{ return false; }}
    const value = '{text}';
    const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
    el.focus();
    setter.call(el, '');
    for (const ch of value) {{
        el.dispatchEvent(new KeyboardEvent('keydown', {{ bubbles: true, key: ch }}));
        el.dispatchEvent(new KeyboardEvent('keypress', {{ bubbles: true, key: ch }}));
        setter.call(el, el.value + ch);
        el.dispatchEvent(new InputEvent('input', {{ bubbles: true, data: ch, inputType: 'insertText' }}));
        el.dispatchEvent(new KeyboardEvent('keyup', {{ bubbles: true, key: ch }}));
    }}
    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return true;
}})()"#,
        sel = escape_selector(selector),
        text = escape_text(text),
    )
}

/// Wait for document ready, a non-empty body and a final render pause, bounded by `timeout_ms`
pub fn page_ready(timeout_ms: u64) -> String {
    format!(
        r#"(async () => {{
    const startTime = Date.now();
    const timeout = {timeout_ms};
    if (document.readyState !== 'complete') {{
        await new Promise((resolve) => {{
            document.addEventListener('readystatechange', () => {{
                if (document.readyState === 'complete') {{ resolve(); }}
            }});
            window.addEventListener('load', () => resolve(), {{ once: true }});
            setTimeout(() => resolve(), Math.min(5000, timeout));
        }});
    }}
    let attempts = 0;
    while (attempts < 20 && (Date.now() - startTime) < timeout) {{
        const body = document.body;
        if (body && body.children.length > 0 && body.innerText.trim().length > 0) {{ break; }}
        await new Promise(resolve => setTimeout(resolve, 200));
        attempts++;
    }}
    if (window.performance && window.performance.timing) {{
        const perf = window.performance.timing;
        if (perf.loadEventEnd - perf.navigationStart > 0 && (Date.now() - perf.loadEventEnd) < 2000) {{
            await new Promise(resolve => setTimeout(resolve, 1000));
        }}
    }}
    await new Promise(resolve => setTimeout(resolve, 1500));
    return {{
        ready: true,
        readyState: document.readyState,
        bodyTextLength: document.body ? document.body.innerText.trim().length : 0
    }};
}})();"#
    )
}

/// Rewrite an arrow-function literal into an immediately-invoked function.
///
/// Only a leading parameter list followed directly by `=>` counts as an arrow;
/// bare expressions are returned trimmed and otherwise untouched.
pub fn to_invocable(expression: &str) -> String {
    let code = expression.trim();
    let Some((is_async, body)) = split_arrow(code) else {
        return code.to_string();
    };
    let function = if is_async { "async function" } else { "function" };

    if body.starts_with('{') && body.ends_with('}') && body.len() >= 2 {
        let inner = body[1..body.len() - 1].trim();
        if inner.starts_with("return") {
            format!("({}() {{ {} }})()", function, inner)
        } else {
            format!("({}() {{ return {}; }})()", function, inner)
        }
    } else {
        format!("({}() {{ return {}; }})()", function, body)
    }
}

/// `[async] (params) => body` split into the async flag and the trimmed body
fn split_arrow(code: &str) -> Option<(bool, &str)> {
    let (is_async, rest) = match code.strip_prefix("async") {
        Some(rest) if rest.starts_with(|c: char| c.is_whitespace() || c == '(') => {
            (true, rest.trim_start())
        }
        _ => (false, code),
    };
    if !rest.starts_with('(') {
        return None;
    }

    let mut depth = 0usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let body = rest[i + 1..].trim_start().strip_prefix("=>")?;
                    return Some((is_async, body.trim()));
                }
            }
            _ => {}
        }
    }
    None
}

/// Pull the evaluated value out of an interleaved bridge response.
///
/// Preference: the item right after a `Result:` label, then the first
/// value-looking item, then the last non-label item. Surrounding quotes are stripped.
pub fn extract_eval_result(items: &[Value]) -> Option<String> {
    let labelled = items
        .iter()
        .position(|item| item.is_object() && item_text(item) == "Result:")
        .and_then(|at| {
            items[at + 1..]
                .iter()
                .find(|item| !item.is_array() && !is_label(item))
        })
        .map(item_text);

    labelled
        .or_else(|| first_value(items))
        .or_else(|| last_item(items))
        .map(|text| strip_quotes(&text).to_string())
}

fn is_label(item: &Value) -> bool {
    LABELS.contains(&item_text(item).as_str())
}

fn first_value(items: &[Value]) -> Option<String> {
    items.iter().find_map(|item| match item {
        Value::Array(_) => None,
        Value::Object(_) => {
            let text = item_text(item);
            (!is_label(item) && !text.is_empty() && looks_like_value(&text)).then_some(text)
        }
        scalar => (!is_label(scalar)).then(|| item_text(scalar)),
    })
}

fn last_item(items: &[Value]) -> Option<String> {
    let last = items.last().filter(|item| !item.is_array())?;
    let text = item_text(last);
    (!text.is_empty() && !is_label(last)).then_some(text)
}

fn looks_like_value(text: &str) -> bool {
    let quoted = is_quoted(text);
    let numeric = {
        let digits: String = text.chars().filter(|c| *c != '.' && *c != '-').collect();
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    };
    quoted || text.to_lowercase().contains("http") || numeric
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
}

fn strip_quotes(text: &str) -> &str {
    if is_quoted(text) {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod script_test;
