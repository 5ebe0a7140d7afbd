//! Typed orchestration faults.
//!
//! Every error that crosses an invocation boundary is a [`Fault`]: a flat,
//! serializable record with a machine code, an HTTP status, and the
//! correlation identity of the invocation that produced it. The [`FaultKind`]
//! tag records which branch of the error cascade produced the fault.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::payload::ErrorPayload;

/// Prefix for hierarchical fault names (`aws-orchestrate/<code>`).
pub const ERROR_NAMESPACE: &str = "aws-orchestrate";

// ─────────────────────────────────────────────────────────────────────────────
// FaultKind
// ─────────────────────────────────────────────────────────────────────────────

/// Which branch of the error cascade produced a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    /// The matcher recognized the error but could not resolve it locally.
    HandledError,
    /// No matcher expectation matched; the default policy surfaced it.
    UnhandledError,
    /// A user-provided substitute error from the default policy.
    DefaultError,
    /// An already-typed error preserved for re-emission without re-wrapping.
    RethrowError,
    /// The error cascade itself failed while handling another error.
    ErrorWithinError,
    /// A caller-typed error that passes through the cascade unchanged.
    ServerlessError,
    /// A function's self-invocation count exceeded the configured limit.
    CallDepthExceeded,
}

impl FaultKind {
    /// The wire token for this kind (the serde tag).
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::HandledError => "handled-error",
            FaultKind::UnhandledError => "unhandled-error",
            FaultKind::DefaultError => "default-error",
            FaultKind::RethrowError => "rethrow-error",
            FaultKind::ErrorWithinError => "error-within-error",
            FaultKind::ServerlessError => "serverless-error",
            FaultKind::CallDepthExceeded => "call-depth-exceeded",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fault
// ─────────────────────────────────────────────────────────────────────────────

/// A typed orchestration fault.
///
/// Flat and fully serializable so it can cross invocation boundaries and be
/// marshalled into a gateway error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{name} [{http_status}]: {message}")]
pub struct Fault {
    /// Cascade branch that produced this fault.
    #[serde(rename = "type")]
    pub kind: FaultKind,
    /// Short machine token, e.g. `unhandled-error` or a user-supplied code.
    pub code: String,
    /// Hierarchical name, `aws-orchestrate/<code>`.
    pub name: String,
    /// HTTP status used when the fault surfaces on a gateway response.
    pub http_status: u16,
    pub message: String,
    /// `<functionName>/<category>` once enriched; the bare category before.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// Textual cause chain, when one was captured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl Fault {
    /// Build a fault with the namespace-qualified name derived from `code`.
    pub fn new(
        kind: FaultKind,
        code: impl Into<String>,
        http_status: u16,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            kind,
            name: format!("{ERROR_NAMESPACE}/{code}"),
            code,
            http_status,
            message: message.into(),
            classification: None,
            correlation_id: None,
            request_id: None,
            function_name: None,
            stack: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Constructors, one per cascade branch
    // ─────────────────────────────────────────────────────────────────────────

    /// The matcher recognized `payload` but no disposition resolved it.
    pub fn handled(http_status: u16, payload: &ErrorPayload) -> Self {
        let code = payload.code.clone().unwrap_or_else(|| "handled-error".into());
        let mut fault = Self::new(FaultKind::HandledError, code, http_status, &payload.message);
        fault.stack = payload.stack.clone();
        fault
    }

    /// No expectation matched; surface with the default code.
    pub fn unhandled(default_status: u16, payload: &ErrorPayload) -> Self {
        let code = payload.code.clone().unwrap_or_else(|| "unhandled-error".into());
        let mut fault = Self::new(FaultKind::UnhandledError, code, default_status, &payload.message);
        fault.stack = payload.stack.clone();
        fault
    }

    /// A caller-typed error. Passes through the cascade unchanged; the
    /// wrapper only enriches it with invocation identity.
    pub fn serverless(
        http_status: u16,
        message: impl Into<String>,
        classification: impl Into<String>,
    ) -> Self {
        let classification = classification.into();
        let mut fault = Self::new(
            FaultKind::ServerlessError,
            classification.clone(),
            http_status,
            message,
        );
        fault.classification = Some(classification);
        fault
    }

    /// Preserve an already-typed fault for re-emission without nesting.
    pub fn rethrow(original: &Fault) -> Self {
        Self {
            kind: FaultKind::RethrowError,
            ..original.clone()
        }
    }

    /// The cascade itself failed while handling `inner`.
    pub fn error_within_error(outer: impl Into<String>, inner: &ErrorPayload) -> Self {
        let mut fault = Self::new(
            FaultKind::ErrorWithinError,
            "error-within-error",
            500,
            format!("{} (while handling: {})", outer.into(), inner.message),
        );
        fault.stack = inner.stack.clone();
        fault
    }

    /// A user-provided substitute surfaced by the default policy; message and
    /// stack are carried over from the original failure.
    pub fn default_error(template: &Fault, original: &ErrorPayload) -> Self {
        let mut fault = template.clone();
        fault.kind = FaultKind::DefaultError;
        if fault.message.is_empty() {
            fault.message = original.message.clone();
        }
        if fault.stack.is_none() {
            fault.stack = original.stack.clone();
        }
        fault
    }

    /// Self-invocation count passed the configured limit.
    pub fn call_depth_exceeded(depth: u32, limit: u32) -> Self {
        Self::new(
            FaultKind::CallDepthExceeded,
            "call-depth-exceeded",
            500,
            format!("call depth {depth} exceeds the configured limit of {limit}"),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enrichment and marshalling
    // ─────────────────────────────────────────────────────────────────────────

    /// Stamp the fault with the identity of the invocation that raised it.
    ///
    /// Rewrites the classification prefix to `<functionName>/<category>`,
    /// keeping whatever category was already recorded.
    pub fn enrich(
        &mut self,
        function_name: impl Into<String>,
        correlation_id: impl Into<String>,
        request_id: impl Into<String>,
    ) {
        let function_name = function_name.into();
        let category = self
            .classification
            .as_deref()
            .map(|c| c.rsplit('/').next().unwrap_or(c).to_string())
            .unwrap_or_else(|| self.code.clone());
        self.classification = Some(format!("{function_name}/{category}"));
        self.function_name = Some(function_name);
        self.correlation_id = Some(correlation_id.into());
        self.request_id = Some(request_id.into());
    }

    /// The JSON body used when this fault surfaces on a gateway response.
    pub fn gateway_body(&self) -> Value {
        let mut body = json!({
            "errorType": self.kind.as_str(),
            "errorMessage": self.message,
            "code": self.code,
            "correlationId": self.correlation_id,
            "requestId": self.request_id,
        });
        if let Some(stack) = &self.stack
            && let Some(map) = body.as_object_mut()
        {
            map.insert("stack".into(), Value::String(stack.clone()));
        }
        body
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
