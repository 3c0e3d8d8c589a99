//! Recovery of usable JSON from damaged model output
//!
//! Models truncate long answers, wrap them in markdown fences, prepend chatter,
//! and leave trailing commas. The helpers here undo each of those without
//! knowing anything about the schema the caller expects.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

fn fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?([\s\S]*?)\r?\n?```")
            .expect("fence pattern is a valid regex")
    })
}

fn trailing_comma_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r",(\s*[}\]])").expect("trailing comma pattern is a valid regex")
    })
}

/// Removes one surrounding markdown code fence
///
/// An opening fence with no closing fence (the usual shape of a truncated
/// answer) loses just its opening line.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(captures) = fence_regex().captures(trimmed) {
        if let Some(body) = captures.get(1) {
            return body.as_str().trim();
        }
    }

    if let Some(rest) = trimmed.strip_prefix("```") {
        return match rest.find('\n') {
            Some(idx) => rest[idx + 1..].trim(),
            None => rest.trim_start_matches("json").trim(),
        };
    }

    trimmed
}

/// Slices from the first `{` to the last `}`, dropping surrounding prose
pub fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Drops commas that directly precede a closing brace or bracket
pub fn remove_trailing_commas(text: &str) -> String {
    trailing_comma_regex().replace_all(text, "$1").into_owned()
}

/// Parses `text` as a JSON object, retrying once after trailing-comma cleanup
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let attempt = |candidate: &str| match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };

    attempt(text).or_else(|| attempt(&remove_trailing_commas(text)))
}

/// Every balanced `{...}` span in `text`, ordered by where it starts
///
/// The scan tracks string literals and escapes so braces inside strings do not
/// count. Spans that never close are skipped, which is what makes this useful
/// on truncated output.
pub fn balanced_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => open.push(idx),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, idx));
                }
            }
            _ => {}
        }
    }

    spans.sort_by_key(|(start, _)| *start);
    spans
        .into_iter()
        .map(|(start, end)| &text[start..=end])
        .collect()
}

/// Independently parses each balanced object that has `key` at its top level
///
/// Objects that fail to parse are discarded. Nested matches inside an object
/// that was already accepted are not returned twice.
pub fn salvage_records(text: &str, key: &str) -> Vec<Map<String, Value>> {
    let needle = format!("\"{}\"", key);
    let mut records = Vec::new();
    let mut covered_until = 0usize;

    for span in balanced_objects(text) {
        if !span.contains(&needle) {
            continue;
        }

        let offset = span.as_ptr() as usize - text.as_ptr() as usize;
        if offset < covered_until {
            continue;
        }

        if let Some(map) = parse_object(span) {
            if map.contains_key(key) {
                covered_until = offset + span.len();
                records.push(map);
            }
        }
    }

    records
}
