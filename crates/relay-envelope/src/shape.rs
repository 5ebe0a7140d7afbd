//! Event-shape detection and the orchestrated wire form.
//!
//! The platform delivers an opaque JSON event that is one of three shapes:
//! a gateway proxy request, an orchestrated envelope produced by a prior
//! step, or a bare invocation payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::compress::{compress, decode_json};
use crate::error::Result;
use crate::gateway::is_gateway_event;

/// Type marker carried by orchestrated envelopes.
pub const ORCHESTRATED_TYPE: &str = "orchestrated-message-body";

/// The three inbound event shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    Gateway,
    Orchestrated,
    Bare,
}

/// Classify an inbound event. Orchestrated wins over gateway: the type
/// marker is explicit while the proxy shape is structural.
pub fn detect(event: &Value) -> EventShape {
    if event.get("type").and_then(Value::as_str) == Some(ORCHESTRATED_TYPE) {
        EventShape::Orchestrated
    } else if is_gateway_event(event) {
        EventShape::Gateway
    } else {
        EventShape::Bare
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrated wire form
// ─────────────────────────────────────────────────────────────────────────────

/// The envelope carried between invocations. `body`, `sequence`, and
/// `headers` are independently compressed JSON strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratedBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub body: String,
    pub sequence: String,
    pub headers: String,
}

impl OrchestratedBody {
    /// Compress three JSON values into an envelope.
    pub fn encode(body: &Value, sequence: &Value, headers: &Value) -> Result<Self> {
        Ok(Self {
            kind: ORCHESTRATED_TYPE.to_string(),
            body: compress(&serde_json::to_string(body)?)?,
            sequence: compress(&serde_json::to_string(sequence)?)?,
            headers: compress(&serde_json::to_string(headers)?)?,
        })
    }

    /// Decompress the three fields back into JSON values.
    pub fn decode(&self) -> Result<(Value, Value, Value)> {
        Ok((
            decode_json(&self.body)?,
            decode_json(&self.sequence)?,
            decode_json(&self.headers)?,
        ))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
