//! Lenient JSON parsing for step options and cycle lists
//!
//! Command files are hand written, so the parser accepts a few common
//! deviations from strict JSON:
//! - `json:` / `py:` prefixes
//! - trailing commas
//! - bare keys (`{waveform:"sine"}`)
//! - bareword values (`{"waveform":sine}`)
//! - Python literals (`{'amplitude': 1.5, 'on': True}`)

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use super::model::StepOptions;

/// Matches a comma directly before a closing bracket or brace
static TRAILING_COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*([}\]])").unwrap());

/// Matches a bare object key: `{start:` or `, step:`
static BARE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([,{]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").unwrap());

/// Matches a bareword value: `: sine,` or `: ch1}`
static BARE_VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*([A-Za-z_][A-Za-z0-9_+-]*)(\s*[,}])").unwrap());

/// Matches Python boolean / None literals outside of strings (best effort)
static PY_LITERAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(True|False|None)\b").unwrap());

/// Remove trailing commas before `}` / `]`
pub fn strip_trailing_commas(s: &str) -> String {
    TRAILING_COMMA_RE.replace_all(s, "$1").into_owned()
}

/// Quote bare keys: `{start:1}` -> `{"start":1}`
pub fn quote_bare_keys(s: &str) -> String {
    BARE_KEY_RE.replace_all(s, "$1\"$2\":").into_owned()
}

/// Quote simple bareword values: `{"waveform":sine}` -> `{"waveform":"sine"}`
fn quote_bare_values(s: &str) -> String {
    BARE_VALUE_RE
        .replace_all(s, |caps: &Captures| {
            let val = &caps[1];
            let tail = &caps[2];
            if matches!(val, "true" | "false" | "null") || val.parse::<f64>().is_ok() {
                format!(": {}{}", val, tail)
            } else {
                format!(": \"{}\"{}", val, tail)
            }
        })
        .into_owned()
}

/// Convert Python dict/list literal syntax into JSON (best effort)
pub fn python_to_json(s: &str) -> String {
    let swapped = s.replace('\'', "\"");
    PY_LITERAL_RE
        .replace_all(&swapped, |caps: &Captures| match &caps[1] {
            "True" => "true".to_string(),
            "False" => "false".to_string(),
            _ => "null".to_string(),
        })
        .into_owned()
}

/// Case-insensitive ASCII prefix strip
pub fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        s.get(prefix.len()..)
    } else {
        None
    }
}

fn as_object(value: Value) -> Result<StepOptions, String> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("options must be a JSON object".to_string()),
    }
}

fn try_object(s: &str) -> Result<StepOptions, String> {
    let value: Value = serde_json::from_str(s).map_err(|e| e.to_string())?;
    as_object(value)
}

/// Parse the options column of a command
///
/// Returns an empty map for blank input. The error message is suitable for
/// prefixing with a line number.
pub fn parse_options(raw: &str) -> Result<StepOptions, String> {
    let mut raw = raw.trim();
    if raw.is_empty() {
        return Ok(StepOptions::new());
    }
    let original = raw;

    if let Some(rest) = strip_prefix_ci(raw, "json:") {
        raw = rest.trim();
    }
    if let Some(rest) = strip_prefix_ci(raw, "py:") {
        raw = rest.trim();
    }

    if let Ok(obj) = try_object(raw) {
        return Ok(obj);
    }

    let cur = strip_trailing_commas(raw);
    if let Ok(obj) = try_object(&cur) {
        return Ok(obj);
    }

    if let Ok(obj) = try_object(&strip_trailing_commas(&python_to_json(raw))) {
        return Ok(obj);
    }

    let cur2 = quote_bare_keys(&cur);
    let cur3 = quote_bare_values(&cur2);

    try_object(&cur3).map_err(|e| {
        format!(
            "invalid JSON options: {}. Hint: JSON requires double quotes and no trailing comma. Options seen: '{}'",
            e, original
        )
    })
}

/// Parse a bracketed list that may contain numbers and range objects
///
/// Tries tolerant JSON first and falls back to Python literal syntax.
pub fn parse_loose_list(raw: &str) -> Result<Vec<Value>, String> {
    let cur = quote_bare_keys(&strip_trailing_commas(raw));
    let value: Value = match serde_json::from_str(&cur) {
        Ok(v) => v,
        Err(first) => {
            let py = strip_trailing_commas(&python_to_json(raw));
            serde_json::from_str(&py).map_err(|_| first.to_string())?
        }
    };
    match value {
        Value::Array(items) => Ok(items),
        _ => Err("expected a list".to_string()),
    }
}
