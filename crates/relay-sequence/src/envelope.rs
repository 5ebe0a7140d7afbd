//! Typed unboxing and boxing of inbound events.
//!
//! [`unbox`] turns the platform's opaque event into `{request, sequence,
//! headers, gateway}`; [`box_envelope`] produces the orchestrated envelope
//! handed to the next step. The raw codec lives in `relay-envelope`; this
//! module adds the typed [`Sequence`] on top.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use relay_envelope::{EventShape, OrchestratedBody, detect, gateway_body_json, gateway_meta};

use crate::error::{Result, SequenceError};
use crate::sequence::Sequence;
use crate::step::SequenceStep;

/// Property on a bare event that carries ingestable steps.
const SEQUENCE_PROP: &str = "_sequence";

/// The product of unboxing an inbound event.
#[derive(Debug, Clone, PartialEq)]
pub struct Unboxed {
    /// The request body for the user function.
    pub request: Value,
    /// The sequence this invocation is part of; the empty sentinel if none.
    pub sequence: Sequence,
    /// Headers propagated between invocations.
    pub headers: BTreeMap<String, String>,
    /// Gateway metadata when the event was a proxy request.
    pub gateway: Option<Value>,
}

impl Unboxed {
    /// Degrade any event to a bare request with an empty sequence. The
    /// fallback for malformed envelopes.
    pub fn bare(event: Value) -> Self {
        Self {
            request: event,
            sequence: Sequence::empty(),
            headers: BTreeMap::new(),
            gateway: None,
        }
    }
}

/// Recognize the event shape and split it into its parts.
///
/// Exactly one of the following holds for the result: it has gateway
/// metadata, or it is part of a sequence, or it is a bare request.
pub fn unbox(event: &Value) -> Result<Unboxed> {
    match detect(event) {
        EventShape::Gateway => {
            let headers = header_map(event.get("headers").unwrap_or(&Value::Null));
            Ok(Unboxed {
                request: gateway_body_json(event),
                sequence: Sequence::empty(),
                headers,
                gateway: Some(gateway_meta(event)),
            })
        }
        EventShape::Orchestrated => {
            let envelope: OrchestratedBody = serde_json::from_value(event.clone())?;
            let (body, sequence, headers) = envelope.decode()?;
            Ok(Unboxed {
                request: body,
                sequence: Sequence::from_wire(&sequence)?,
                headers: header_map(&headers),
                gateway: None,
            })
        }
        EventShape::Bare => unbox_bare(event),
    }
}

/// A bare event: the event is the request itself. A `_sequence` property is
/// ingested as the step list and stripped from the request.
fn unbox_bare(event: &Value) -> Result<Unboxed> {
    let Some(steps_value) = event.get(SEQUENCE_PROP) else {
        return Ok(Unboxed::bare(event.clone()));
    };
    let steps: Vec<SequenceStep> = serde_json::from_value(steps_value.clone())?;

    let mut request = event.clone();
    if let Some(map) = request.as_object_mut() {
        map.remove(SEQUENCE_PROP);
    }

    let mut sequence = Sequence::empty();
    let request = sequence.ingest_steps(&request, steps)?;
    Ok(Unboxed {
        request,
        sequence,
        headers: BTreeMap::new(),
        gateway: None,
    })
}

/// Produce the orchestrated envelope for the next invocation.
pub fn box_envelope(
    body: &Value,
    sequence: &Sequence,
    headers: &BTreeMap<String, String>,
) -> Result<Value> {
    let headers_value = json!(headers);
    let envelope = OrchestratedBody::encode(body, &sequence.to_wire()?, &headers_value)
        .map_err(SequenceError::from)?;
    Ok(serde_json::to_value(envelope)?)
}

/// Copy a JSON header object into a string map, dropping non-string values.
fn header_map(value: &Value) -> BTreeMap<String, String> {
    let Some(map) = value.as_object() else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
