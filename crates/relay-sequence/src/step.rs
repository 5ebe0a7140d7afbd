//! A single planned invocation within a sequence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::Condition;

/// Progression status of a step. A step's status only advances through this
/// ordered set; it never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Assigned,
    Active,
    Completed,
    Skipped,
}

/// What kind of function a step invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FnType {
    #[default]
    Task,
    FanOut,
    FanIn,
    Other,
}

/// Error handling attached to a step by the conductor.
///
/// Serialized plans cannot carry closures, so local handlers are referenced
/// by name and resolved against the wrapper's registry at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "handler")]
pub enum StepErrorHandler {
    /// Forward the error payload to another function.
    Forward {
        arn: String,
        #[serde(default)]
        params: Map<String, Value>,
    },
    /// Run a callback registered on the wrapper under this name.
    Named { name: String },
}

/// One planned invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceStep {
    /// Target function: a full ARN or a short name expanded at invoke time.
    pub arn: String,
    /// Parameter mapping; values may be dynamic references.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Predicate evaluated at activation; false sends the step to `Skipped`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Conductor-level error policy with the final say in the cascade.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_error: Option<StepErrorHandler>,
    #[serde(default)]
    pub fn_type: FnType,
    pub status: StepStatus,
}

impl SequenceStep {
    pub fn new(arn: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            arn: arn.into(),
            params,
            condition: None,
            on_error: None,
            fn_type: FnType::Task,
            status: StepStatus::Assigned,
        }
    }

    pub fn with_type(mut self, fn_type: FnType) -> Self {
        self.fn_type = fn_type;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_assigned(&self) -> bool {
        self.status == StepStatus::Assigned
    }

    pub fn is_active(&self) -> bool {
        self.status == StepStatus::Active
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StepStatus::Skipped
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_defaults() {
        let step = SequenceStep::new("fn-a", Map::new());
        assert_eq!(step.status, StepStatus::Assigned);
        assert_eq!(step.fn_type, FnType::Task);
        assert!(step.condition.is_none());
        assert!(step.on_error.is_none());
    }

    #[test]
    fn test_step_wire_format() {
        let mut params = Map::new();
        params.insert("n".into(), json!(2));
        let step = SequenceStep::new("fn-a", params).with_type(FnType::FanOut);

        let wire = serde_json::to_value(&step).unwrap();
        assert_eq!(wire["arn"], "fn-a");
        assert_eq!(wire["status"], "assigned");
        assert_eq!(wire["fnType"], "fan-out");
        assert_eq!(wire["params"]["n"], 2);

        let back: SequenceStep = serde_json::from_value(wire).unwrap();
        assert_eq!(back, step);
    }

    #[test]
    fn test_error_handler_wire_format() {
        let forward = StepErrorHandler::Forward {
            arn: "reporter".into(),
            params: Map::new(),
        };
        let wire = serde_json::to_value(&forward).unwrap();
        assert_eq!(wire["handler"], "forward");
        assert_eq!(wire["arn"], "reporter");

        let named = StepErrorHandler::Named {
            name: "cleanup".into(),
        };
        let wire = serde_json::to_value(&named).unwrap();
        assert_eq!(wire["handler"], "named");
        let back: StepErrorHandler = serde_json::from_value(wire).unwrap();
        assert_eq!(back, named);
    }
}
