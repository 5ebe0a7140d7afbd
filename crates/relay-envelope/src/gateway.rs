//! Gateway-proxy request and response shapes.
//!
//! Inbound proxy events are handled structurally (a `headers` object plus
//! the usual proxy fields) rather than through a fully-typed event struct —
//! the wrapper only needs the body, the headers, and the rest of the event
//! as opaque gateway metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Proxy fields that mark an event as a gateway request.
const PROXY_FIELDS: &[&str] = &["requestContext", "httpMethod", "path", "resource"];

/// The outbound proxy-integration response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl GatewayResponse {
    pub fn new(status_code: u16, headers: BTreeMap<String, String>, body: String) -> Self {
        Self {
            status_code,
            headers,
            body,
        }
    }
}

/// CORS headers attached to every gateway response.
pub fn cors_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        (
            "Access-Control-Allow-Credentials".to_string(),
            "true".to_string(),
        ),
    ])
}

/// Whether an event is a gateway proxy request: a `headers` *object* plus at
/// least one of the usual proxy fields. Orchestrated envelopes carry their
/// headers as a compressed string, so they never match.
pub fn is_gateway_event(event: &Value) -> bool {
    let has_header_map = event.get("headers").is_some_and(Value::is_object);
    has_header_map && PROXY_FIELDS.iter().any(|f| event.get(*f).is_some())
}

/// The JSON-parsed body of a gateway request.
///
/// A missing body becomes an empty object; a body that is not JSON is kept
/// as a plain string value.
pub fn gateway_body_json(event: &Value) -> Value {
    match event.get("body") {
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) if !other.is_null() => other.clone(),
        _ => json!({}),
    }
}

/// The gateway metadata: the event minus `body` and `headers`.
pub fn gateway_meta(event: &Value) -> Value {
    match event {
        Value::Object(map) => {
            let mut meta = map.clone();
            meta.remove("body");
            meta.remove("headers");
            Value::Object(meta)
        }
        other => other.clone(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
