//! Conditional-step predicates.
//!
//! Serialized plans cannot carry code, so predicates are a small data DSL
//! evaluated against the responses map at activation time. Paths use the
//! same dot/index syntax as dynamic parameters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::lookup_path;

/// A serializable predicate over the sequence's responses map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Condition {
    /// Always activate.
    Always,
    /// The path resolves to some value.
    Exists { path: String },
    /// The path resolves to exactly `value`.
    Eq { path: String, value: Value },
    /// The path resolves to something other than `value` (or not at all).
    Ne { path: String, value: Value },
    /// Negation.
    Not { cond: Box<Condition> },
    /// Every sub-condition holds.
    All { conds: Vec<Condition> },
    /// At least one sub-condition holds.
    Any { conds: Vec<Condition> },
}

impl Condition {
    /// Evaluate against the responses recorded so far.
    pub fn evaluate(&self, responses: &Map<String, Value>) -> bool {
        match self {
            Condition::Always => true,
            Condition::Exists { path } => lookup_path(responses, path).is_some(),
            Condition::Eq { path, value } => lookup_path(responses, path) == Some(value),
            Condition::Ne { path, value } => lookup_path(responses, path) != Some(value),
            Condition::Not { cond } => !cond.evaluate(responses),
            Condition::All { conds } => conds.iter().all(|c| c.evaluate(responses)),
            Condition::Any { conds } => conds.iter().any(|c| c.evaluate(responses)),
        }
    }

    pub fn exists(path: impl Into<String>) -> Self {
        Condition::Exists { path: path.into() }
    }

    pub fn eq(path: impl Into<String>, value: Value) -> Self {
        Condition::Eq {
            path: path.into(),
            value,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
