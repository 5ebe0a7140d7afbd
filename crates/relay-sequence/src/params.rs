//! Dynamic-parameter resolution.
//!
//! A step parameter whose value is `{ "lookup": "stepId.jsonPath" }` is
//! resolved at activation time against the sequence's responses map. The
//! legacy form — a string beginning with `:` — is treated the same way, with
//! the path being the remainder of the string.
//!
//! Paths are dot-separated with optional array indices:
//! `fetch.items[0].name` navigates the response recorded for step `fetch`.

use serde_json::{Map, Value, json};

use crate::error::{Result, SequenceError};

/// Key of the dynamic-reference sentinel object.
const LOOKUP_KEY: &str = "lookup";

/// Prefix of the legacy string form.
const LEGACY_PREFIX: char = ':';

/// Build a dynamic-reference parameter value.
pub fn dynamic_ref(path: &str) -> Value {
    json!({ LOOKUP_KEY: path })
}

/// The lookup path of a dynamic reference, if `value` is one.
pub fn dynamic_path(value: &Value) -> Option<&str> {
    match value {
        Value::Object(map) if map.len() == 1 => map.get(LOOKUP_KEY).and_then(Value::as_str),
        Value::String(s) => s.strip_prefix(LEGACY_PREFIX),
        _ => None,
    }
}

/// The short function name of an ARN: the part after `function:` for a full
/// ARN, the whole string otherwise. Responses are keyed by this.
pub fn short_fn_name(arn: &str) -> &str {
    match arn.rfind("function:") {
        Some(idx) => &arn[idx + "function:".len()..],
        None => arn,
    }
}

/// Navigate a dot-separated path with optional array indices through the
/// responses map.
pub fn lookup_path<'a>(responses: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let root = segments.next()?;
    let mut current = responses.get(root)?;
    for segment in segments {
        current = navigate_segment(current, segment)?;
    }
    Some(current)
}

/// Navigate one `name` or `name[idx]` segment.
fn navigate_segment<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    if let Some(bracket_start) = segment.find('[')
        && let Some(bracket_end) = segment.find(']')
    {
        let name = &segment[..bracket_start];
        let index: usize = segment[bracket_start + 1..bracket_end].parse().ok()?;
        let field = if name.is_empty() { value } else { value.get(name)? };
        return field.get(index);
    }
    value.get(segment)
}

/// Resolve every dynamic reference in a parameter mapping.
///
/// Non-dynamic values pass through unchanged. A lookup miss fails the whole
/// resolution with an error naming the parameter key and the source path.
pub fn resolve_params(
    params: &Map<String, Value>,
    responses: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for (key, value) in params {
        match dynamic_path(value) {
            Some(path) => {
                let found =
                    lookup_path(responses, path).ok_or_else(|| SequenceError::UnresolvedReference {
                        key: key.clone(),
                        path: path.to_string(),
                    })?;
                resolved.insert(key.clone(), found.clone());
            }
            None => {
                resolved.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(resolved)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
