//! Tolerant extraction of a [`StructuredResponse`] from model text.
//!
//! Model output is untrusted: it may wrap the JSON in prose, emit several
//! JSON-like fragments, leave trailing commas, or contain no JSON at all.
//! Parsing never fails; unrecoverable text yields the degraded shape with the
//! raw text preserved in `notes`.

use copilot_core::{Severity, StructuredResponse};
use serde_json::{Map, Value};

/// Parse result plus whether the degraded fallback was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutcome {
    pub response: StructuredResponse,
    pub degraded: bool,
}

/// Stateless parser for model output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    /// Total parse. Never fails.
    pub fn parse(raw: &str) -> StructuredResponse {
        Self::parse_outcome(raw).response
    }

    /// Parse and report whether the result is degraded.
    pub fn parse_outcome(raw: &str) -> ParseOutcome {
        match first_object(raw) {
            Some(object) => ParseOutcome {
                response: map_object(&object),
                degraded: false,
            },
            None => ParseOutcome {
                response: StructuredResponse::degraded(raw),
                degraded: true,
            },
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// First JSON object in `raw`, by leftmost start position.
///
/// Every `{` is a candidate start. Starts that cannot begin an object (shell
/// expansions like `${HOME}`, template placeholders) are rejected without
/// scanning for their closing brace.
fn first_object(raw: &str) -> Option<Map<String, Value>> {
    raw.match_indices('{')
        .filter(|(start, _)| opens_object(raw, *start))
        .filter_map(|(start, _)| balanced_end(raw, start).map(|end| &raw[start..end]))
        .find_map(parse_candidate)
}

/// An object's first token after `{` is a key string or the closing brace.
fn opens_object(raw: &str, start: usize) -> bool {
    matches!(
        raw.as_bytes()[start + 1..]
            .iter()
            .find(|b| !b.is_ascii_whitespace()),
        Some(b'"') | Some(b'}')
    )
}

/// Byte offset just past the `}` matching the `{` at `start`, ignoring braces
/// inside string literals.
fn balanced_end(raw: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in raw.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strict parse, then one lenient repair.
fn parse_candidate(candidate: &str) -> Option<Map<String, Value>> {
    let as_object = |text: &str| match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    };
    as_object(candidate).or_else(|| as_object(&strip_trailing_commas(candidate)))
}

/// Remove commas that directly precede `}` or `]` (outside strings).
pub fn strip_trailing_commas(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut last = 0;

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b',' => {
                let next = bytes[i + 1..].iter().find(|b| !b.is_ascii_whitespace());
                if matches!(next, Some(b'}') | Some(b']')) {
                    out.push_str(&text[last..i]);
                    last = i + 1;
                }
            }
            _ => {}
        }
    }
    out.push_str(&text[last..]);
    out
}

// ============================================================================
// FIELD MAPPING
// ============================================================================

/// Case-insensitive lookup over a list of accepted key spellings.
fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn text(value: Option<&Value>) -> String {
    value.and_then(scalar_text).unwrap_or_default()
}

fn map_object(object: &Map<String, Value>) -> StructuredResponse {
    StructuredResponse {
        investigation_steps: string_list(field(object, &["investigation_steps", "investigation"])),
        commands: string_list(field(object, &["commands"])),
        fixes: string_list(field(object, &["fixes"])),
        severity: match field(object, &["severity"]) {
            Some(Value::String(label)) => Severity::from_label(label),
            _ => Severity::Unknown,
        },
        recommended_action: text(field(object, &["recommended_action"])),
        notes: text(field(object, &["notes"])),
    }
}
