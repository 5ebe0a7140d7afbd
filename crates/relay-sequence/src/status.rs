//! The tracker status payload.
//!
//! Published by the wrapper to a configured tracker function after each
//! progression, so observers can follow an in-flight sequence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sequence::Sequence;

/// Where the sequence stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SequenceState {
    Running,
    Success { data: Value },
    Error { error: Value },
}

/// One progression report for an in-flight sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStatus {
    pub correlation_id: String,
    /// Total number of steps in the plan.
    pub total: usize,
    /// Steps no longer pending (completed or skipped).
    pub current: usize,
    /// The function reporting this status.
    pub current_fn: String,
    /// The conductor that started the sequence, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_fn: Option<String>,
    #[serde(flatten)]
    pub state: SequenceState,
}

impl SequenceStatus {
    fn snapshot(
        sequence: &Sequence,
        correlation_id: impl Into<String>,
        current_fn: impl Into<String>,
        state: SequenceState,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            total: sequence.len(),
            current: sequence.completed() + sequence.skipped(),
            current_fn: current_fn.into(),
            origin_fn: None,
            state,
        }
    }

    pub fn running(
        sequence: &Sequence,
        correlation_id: impl Into<String>,
        current_fn: impl Into<String>,
    ) -> Self {
        Self::snapshot(sequence, correlation_id, current_fn, SequenceState::Running)
    }

    pub fn success(
        sequence: &Sequence,
        correlation_id: impl Into<String>,
        current_fn: impl Into<String>,
        data: Value,
    ) -> Self {
        Self::snapshot(
            sequence,
            correlation_id,
            current_fn,
            SequenceState::Success { data },
        )
    }

    pub fn error(
        sequence: &Sequence,
        correlation_id: impl Into<String>,
        current_fn: impl Into<String>,
        error: Value,
    ) -> Self {
        Self::snapshot(
            sequence,
            correlation_id,
            current_fn,
            SequenceState::Error { error },
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
