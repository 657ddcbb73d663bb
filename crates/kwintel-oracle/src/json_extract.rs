//! Best-effort recovery of a JSON payload from model output.
//!
//! Models wrap JSON in prose, code fences, or trailing commentary, and
//! sometimes stop mid-document. [`extract_json`] tries, in order:
//!
//! 1. the whole trimmed text;
//! 2. the span from the first `{`/`[` to the last matching `}`/`]`;
//! 3. each balanced bracket group (string-aware) from left to right.
//!
//! The first candidate that parses to an object or array wins. Scalars are
//! never returned. An opener that is never closed ends the search, so a
//! truncated document yields `None` rather than one of its nested elements.

use serde_json::Value;

/// Recover the first JSON object or array embedded in `text`.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_container(trimmed) {
        return Some(value);
    }

    if let Some(value) = outer_span(trimmed).and_then(parse_container) {
        return Some(value);
    }

    let bytes = trimmed.as_bytes();
    let mut from = 0;
    while let Some(offset) = trimmed[from..].find(['{', '[']) {
        let start = from + offset;
        // Everything after an unclosed opener is nested inside it.
        let end = balanced_end(bytes, start)?;
        if let Some(value) = parse_container(&trimmed[start..=end]) {
            return Some(value);
        }
        from = start + 1;
    }
    None
}

fn parse_container(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

/// From the first opener to the last closer of the same kind.
fn outer_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// Index of the bracket closing the group opened at `start`, skipping
/// brackets inside JSON strings. Bracket kinds are not cross-checked; the
/// parser rejects mismatches.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
