//! The function-invocation port.
//!
//! The actual transport (the cloud SDK) stays outside this workspace; the
//! runtime only needs "fire this function with this JSON payload". The mock
//! records every call for assertions and replays configured responses.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by an invocation transport.
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("invocation of {arn} failed: {reason}")]
    Failed { arn: String, reason: String },

    #[error("invocation target not found: {0}")]
    NotFound(String),
}

/// Trait for function-invocation transports.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoke the function identified by `arn` with a JSON payload and
    /// return the platform's invocation response.
    async fn invoke(&self, arn: &str, payload: Value) -> Result<Value, InvokeError>;
}

/// An invoker that can be shared across tasks.
pub type SharedInvoker = Arc<dyn Invoker>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Invoker
// ─────────────────────────────────────────────────────────────────────────────

/// A recording invoker for tests.
///
/// Responses are returned in order; once exhausted, calls return `null`.
#[derive(Debug, Default)]
pub struct MockInvoker {
    responses: Mutex<Vec<Value>>,
    call_log: Mutex<Vec<(String, Value)>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock that answers calls with the given responses in order.
    pub fn with_responses(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses),
            call_log: Mutex::new(Vec::new()),
        }
    }

    /// Every `(arn, payload)` pair invoked so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.call_log.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    async fn invoke(&self, arn: &str, payload: Value) -> Result<Value, InvokeError> {
        self.call_log
            .lock()
            .unwrap()
            .push((arn.to_string(), payload));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(responses.remove(0))
        }
    }
}

/// An invoker that fails every call; for exercising error paths.
#[derive(Debug, Default)]
pub struct FailingInvoker;

#[async_trait]
impl Invoker for FailingInvoker {
    async fn invoke(&self, arn: &str, _payload: Value) -> Result<Value, InvokeError> {
        Err(InvokeError::Failed {
            arn: arn.to_string(),
            reason: "transport unavailable".to_string(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
