//! Untyped handler failures.
//!
//! [`ErrorPayload`] is the shape of an error *before* the cascade has typed
//! it: a message, an optional short code, an optional suggested status, and
//! any extra JSON the business logic attached. Matcher predicates run against
//! this view.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::fault::Fault;

/// An untyped failure raised by handler logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ErrorPayload {
    pub message: String,
    /// Short machine token, when the raising code supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Suggested HTTP status, when the raising code supplied one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Extra fields attached by the raising code.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorPayload {
    /// A bare message with no code or status.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: None,
            data: Value::Null,
            stack: None,
        }
    }

    /// A message with a short machine code.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::msg(message)
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl From<serde_json::Error> for ErrorPayload {
    fn from(err: serde_json::Error) -> Self {
        Self::with_code(err.to_string(), "serialization")
    }
}

impl From<String> for ErrorPayload {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for ErrorPayload {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HandlerError
// ─────────────────────────────────────────────────────────────────────────────

/// What a wrapped handler fails with.
///
/// A [`Fault`] short-circuits the matcher (caller-typed errors pass through
/// the cascade unchanged); a raw [`ErrorPayload`] is routed through the
/// matcher and the default policy.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error(transparent)]
    Raw(#[from] ErrorPayload),
}

impl HandlerError {
    /// Raise an untyped failure from a bare message.
    pub fn raw(message: impl Into<String>) -> Self {
        Self::Raw(ErrorPayload::msg(message))
    }

    /// View this failure as an untyped payload for matcher predicates.
    pub fn payload(&self) -> ErrorPayload {
        match self {
            HandlerError::Raw(p) => p.clone(),
            HandlerError::Fault(f) => ErrorPayload {
                message: f.message.clone(),
                code: Some(f.code.clone()),
                status: Some(f.http_status),
                data: Value::Null,
                stack: f.stack.clone(),
            },
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Raw(err.into())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
