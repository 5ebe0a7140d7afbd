//! Per-invocation handler context.
//!
//! Everything a handler can reach lives here: correlation identity, the
//! sequence it is part of, gateway metadata, decoded claims, the port
//! handles, response-shaping knobs, and the error-matcher registry.
//!
//! The context is rebuilt from scratch on every invocation. Response
//! shaping, the registered sequence, and the secret mask are interior
//! state behind a mutex so container reuse can never bleed one
//! invocation's state into the next.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::{Map, Value};

use relay_sequence::{Sequence, SharedInvoker};

use crate::matcher::ErrorMatcher;
use crate::secrets::SharedSecrets;
use crate::store::SharedStore;

/// Inbound headers with this prefix carry secret values that must never
/// appear in logs.
pub(crate) const SECRET_HEADER_PREFIX: &str = "X-Secret-";

#[derive(Default)]
struct InvocationState {
    status_code: Option<u16>,
    content_type: Option<String>,
    extra_headers: BTreeMap<String, String>,
    registered_sequence: Option<Sequence>,
    mask: Vec<String>,
}

/// The per-invocation record supplied to the user function.
pub struct HandlerContext {
    correlation_id: String,
    function_name: String,
    request_id: String,
    remaining_time_ms: Option<u64>,
    sequence: Sequence,
    gateway: Option<Value>,
    headers: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    claims: Map<String, Value>,
    secrets: SharedSecrets,
    store: SharedStore,
    invoker: SharedInvoker,
    matcher: Mutex<ErrorMatcher>,
    state: Mutex<InvocationState>,
}

impl HandlerContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        correlation_id: String,
        function_name: String,
        request_id: String,
        remaining_time_ms: Option<u64>,
        sequence: Sequence,
        gateway: Option<Value>,
        headers: BTreeMap<String, String>,
        secrets: SharedSecrets,
        store: SharedStore,
        invoker: SharedInvoker,
    ) -> Self {
        let claims = extract_claims(gateway.as_ref());
        let query = extract_query(gateway.as_ref());
        let ctx = Self {
            correlation_id,
            function_name,
            request_id,
            remaining_time_ms,
            sequence,
            gateway,
            headers,
            query,
            claims,
            secrets,
            store,
            invoker,
            matcher: Mutex::new(ErrorMatcher::new()),
            state: Mutex::new(InvocationState::default()),
        };
        ctx.register_secret_headers();
        ctx
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Identity and inbound data
    // ─────────────────────────────────────────────────────────────────────────

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn remaining_time_ms(&self) -> Option<u64> {
        self.remaining_time_ms
    }

    /// The sequence this invocation is part of; the empty sentinel if none.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// Gateway metadata when the event was a proxy request.
    pub fn gateway(&self) -> Option<&Value> {
        self.gateway.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Decoded authorizer claims; empty when the request carried none.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ports
    // ─────────────────────────────────────────────────────────────────────────

    pub fn secrets(&self) -> &SharedSecrets {
        &self.secrets
    }

    /// Factory handle for the status document store.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn invoker(&self) -> &SharedInvoker {
        &self.invoker
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Response shaping
    // ─────────────────────────────────────────────────────────────────────────

    /// Status code for a successful gateway response.
    pub fn set_status_code(&self, status: u16) {
        self.state.lock().unwrap().status_code = Some(status);
    }

    pub fn set_content_type(&self, content_type: impl Into<String>) {
        self.state.lock().unwrap().content_type = Some(content_type.into());
    }

    /// Append a header to the gateway response.
    pub fn append_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .extra_headers
            .insert(name.into(), value.into());
    }

    pub(crate) fn status_code(&self) -> Option<u16> {
        self.state.lock().unwrap().status_code
    }

    pub(crate) fn content_type(&self) -> Option<String> {
        self.state.lock().unwrap().content_type.clone()
    }

    pub(crate) fn extra_headers(&self) -> BTreeMap<String, String> {
        self.state.lock().unwrap().extra_headers.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sequences
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a freshly built sequence; after the current chain's
    /// continuation fires, its first step is invoked with the handler's
    /// return value as seed input.
    pub fn register_sequence(&self, sequence: Sequence) {
        self.state.lock().unwrap().registered_sequence = Some(sequence);
    }

    pub(crate) fn take_registered_sequence(&self) -> Option<Sequence> {
        self.state.lock().unwrap().registered_sequence.take()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Error matching
    // ─────────────────────────────────────────────────────────────────────────

    /// Register error expectations for this invocation.
    pub fn errors<F: FnOnce(&mut ErrorMatcher)>(&self, register: F) {
        register(&mut self.matcher.lock().unwrap());
    }

    pub(crate) fn take_matcher(&self) -> ErrorMatcher {
        std::mem::take(&mut self.matcher.lock().unwrap())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Secret masking
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a value to the log mask.
    pub fn register_secret(&self, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.state.lock().unwrap().mask.push(value);
        }
    }

    /// Replace every masked value in `text`.
    pub fn redact(&self, text: &str) -> String {
        let state = self.state.lock().unwrap();
        let mut out = text.to_string();
        for secret in &state.mask {
            out = out.replace(secret.as_str(), "****");
        }
        out
    }

    fn register_secret_headers(&self) {
        let prefix = SECRET_HEADER_PREFIX.to_ascii_lowercase();
        let secret_values: Vec<String> = self
            .headers
            .iter()
            .filter(|(k, _)| k.to_ascii_lowercase().starts_with(&prefix))
            .map(|(_, v)| v.clone())
            .collect();
        for value in secret_values {
            self.register_secret(value);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extraction helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Custom claims from `requestContext.authorizer.customClaims`, JSON-decoded,
/// defaulting to an empty mapping.
fn extract_claims(gateway: Option<&Value>) -> Map<String, Value> {
    let Some(claims) = gateway.and_then(|gw| gw.pointer("/requestContext/authorizer/customClaims"))
    else {
        return Map::new();
    };
    match claims {
        Value::String(raw) => serde_json::from_str(raw).unwrap_or_default(),
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    }
}

fn extract_query(gateway: Option<&Value>) -> BTreeMap<String, String> {
    let Some(map) = gateway
        .and_then(|gw| gw.get("queryStringParameters"))
        .and_then(Value::as_object)
    else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
