//! The sequence: an ordered plan of invocations plus the responses recorded
//! so far.
//!
//! Status multiset invariant, read in step order:
//! `{completed}* · {active}? · ({assigned}|{skipped})*` — at most one step is
//! active, and a status only ever advances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::condition::Condition;
use crate::error::{Result, SequenceError};
use crate::invoker::Invoker;
use crate::params::{resolve_params, short_fn_name};
use crate::step::{FnType, SequenceStep, StepErrorHandler, StepStatus};

/// The resolved target of a [`Sequence::next`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct NextInvocation {
    /// Target function, still in whatever form the conductor wrote it.
    pub arn: String,
    /// The resolved parameter mapping, the request body for the next step.
    pub body: Value,
}

/// An ordered plan of handler invocations sharing correlation identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sequence {
    is_sequence: bool,
    #[serde(default)]
    steps: Vec<SequenceStep>,
    #[serde(default)]
    responses: Map<String, Value>,
}

impl Sequence {
    /// The empty sentinel: not a sequence until a step is added.
    pub fn empty() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Building (conductor side)
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a task step. The model does not deduplicate; uniqueness is the
    /// caller's concern.
    pub fn add(&mut self, arn: impl Into<String>, params: Map<String, Value>) -> &mut Self {
        self.add_typed(arn, params, FnType::Task)
    }

    /// Append a step with an explicit function type.
    pub fn add_typed(
        &mut self,
        arn: impl Into<String>,
        params: Map<String, Value>,
        fn_type: FnType,
    ) -> &mut Self {
        self.steps
            .push(SequenceStep::new(arn, params).with_type(fn_type));
        self.is_sequence = true;
        self
    }

    /// Append a conditional step: at activation the predicate is evaluated
    /// against the responses map, and a false result skips the step.
    pub fn on_condition(
        &mut self,
        condition: Condition,
        arn: impl Into<String>,
        params: Map<String, Value>,
    ) -> &mut Self {
        self.steps
            .push(SequenceStep::new(arn, params).with_condition(condition));
        self.is_sequence = true;
        self
    }

    /// Attach error handling to the most recently added step.
    pub fn on_error(&mut self, handler: StepErrorHandler) -> Result<&mut Self> {
        let step = self.steps.last_mut().ok_or(SequenceError::NoSteps)?;
        step.on_error = Some(handler);
        Ok(self)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived views
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether this is a real sequence (has at least one step).
    pub fn is_sequence(&self) -> bool {
        self.is_sequence && !self.steps.is_empty()
    }

    /// Whether no assigned step remains.
    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }

    /// Count of steps still assigned.
    pub fn remaining(&self) -> usize {
        self.steps.iter().filter(|s| s.is_assigned()).count()
    }

    /// Count of completed steps.
    pub fn completed(&self) -> usize {
        self.steps.iter().filter(|s| s.is_completed()).count()
    }

    /// Count of skipped steps.
    pub fn skipped(&self) -> usize {
        self.steps.iter().filter(|s| s.is_skipped()).count()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[SequenceStep] {
        &self.steps
    }

    pub fn responses(&self) -> &Map<String, Value> {
        &self.responses
    }

    /// The currently active step, without advancing.
    pub fn active(&self) -> Option<&SequenceStep> {
        self.steps.iter().find(|s| s.is_active())
    }

    /// The first assigned step, without advancing.
    pub fn next_fn(&self) -> Option<&SequenceStep> {
        self.steps.iter().find(|s| s.is_assigned())
    }

    /// The active step, lazily promoting the first assigned step when no
    /// step is active yet. The lazy advance is intentional: a sequence
    /// rebuilt from the wire observes its own position this way.
    pub fn active_fn(&mut self) -> Option<&SequenceStep> {
        if self.active().is_none() && self.next_fn().is_some() {
            // Promotion can only fail when nothing is assigned, which the
            // check above rules out.
            let idx = self.promote().ok()?;
            return self.steps.get(idx);
        }
        self.steps.iter().find(|s| s.is_active())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Progression
    // ─────────────────────────────────────────────────────────────────────────

    /// Promote the first assigned step to active, skipping conditional steps
    /// whose predicate is false. Returns the index of the new active step.
    fn promote(&mut self) -> Result<usize> {
        loop {
            let Some(idx) = self.steps.iter().position(|s| s.is_assigned()) else {
                return Err(SequenceError::NoRemainingSteps);
            };
            let skip = self.steps[idx]
                .condition
                .as_ref()
                .is_some_and(|c| !c.evaluate(&self.responses));
            if skip {
                self.steps[idx].status = StepStatus::Skipped;
                continue;
            }
            self.steps[idx].status = StepStatus::Active;
            return Ok(idx);
        }
    }

    /// Finalize the active step: mark it completed and record its response
    /// under its short function name. The only transition that writes into
    /// the responses map.
    pub fn finish_step(&mut self, response: Value) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.is_active()) {
            step.status = StepStatus::Completed;
            let key = short_fn_name(&step.arn).to_string();
            self.responses.insert(key, response);
        }
    }

    /// Advance the sequence: finalize the active step with the current
    /// function's response, promote the next assigned step, and resolve its
    /// parameters. Fails when no assigned step remains.
    ///
    /// On a freshly built sequence (no active step yet) the response is
    /// treated as seed input and nothing is recorded.
    pub fn next(&mut self, current_response: Value) -> Result<NextInvocation> {
        let seed = if self.active().is_some() {
            self.finish_step(current_response);
            None
        } else {
            current_response.as_object().cloned()
        };

        let idx = self.promote()?;
        let mut resolved = resolve_params(&self.steps[idx].params, &self.responses)?;
        if let Some(seed) = seed {
            // Seed input wins over conductor-set params on key collision.
            for (k, v) in seed {
                resolved.insert(k, v);
            }
        }
        self.steps[idx].params = resolved.clone();

        Ok(NextInvocation {
            arn: self.steps[idx].arn.clone(),
            body: Value::Object(resolved),
        })
    }

    /// Replace the step list on a freshly built sequence, as part of
    /// unboxing an inbound envelope. The active step's conductor-set params
    /// are merged with the incoming request — the request wins on key
    /// collision — and the merged request is returned.
    pub fn ingest_steps(
        &mut self,
        current_request: &Value,
        steps: Vec<SequenceStep>,
    ) -> Result<Value> {
        if !self.steps.is_empty() {
            return Err(SequenceError::StepsAlreadyPresent);
        }
        self.steps = steps;
        self.is_sequence = !self.steps.is_empty();

        let params = match self.active_fn() {
            Some(step) => step.params.clone(),
            None => return Ok(current_request.clone()),
        };
        let Some(request) = current_request.as_object() else {
            return Ok(current_request.clone());
        };
        let mut merged = params;
        for (k, v) in request {
            merged.insert(k.clone(), v.clone());
        }
        Ok(Value::Object(merged))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Wire form
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize to the `{isSequence, steps, responses}` wire form.
    pub fn to_wire(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuild from the wire form.
    pub fn from_wire(value: &Value) -> Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Start a freshly built sequence: resolve its first step and invoke it
    /// through the given transport, returning the platform's response.
    pub async fn start(
        &mut self,
        invoker: &dyn Invoker,
        headers: &BTreeMap<String, String>,
    ) -> Result<Value> {
        let target = self.next(json!({}))?;
        let envelope = crate::envelope::box_envelope(&target.body, self, headers)?;
        let arn = crate::arn::expand_function_arn(&target.arn)?;
        tracing::debug!(arn = %arn, "starting sequence");
        Ok(invoker.invoke(&arn, envelope).await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
