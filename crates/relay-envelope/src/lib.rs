//! relay-envelope
//!
//! The wire layer of the Relay runtime: recognizing the three inbound event
//! shapes (bare, orchestrated, gateway-proxy), compressing and decompressing
//! envelope fields, and the header conventions that carry correlation
//! identity between invocations.
//!
//! This crate stays untyped about sequences on purpose — the orchestrated
//! envelope carries its sequence as an opaque compressed string, and the
//! typed `Sequence` codec lives one layer up in `relay-sequence`.

mod compress;
mod error;
mod gateway;
mod headers;
mod shape;

pub use compress::{DEFLATE_MARKER, compress, decode_json, decompress};
pub use error::{EnvelopeError, Result};
pub use gateway::{
    CONTENT_TYPE_JSON, GatewayResponse, cors_headers, gateway_body_json, gateway_meta,
    is_gateway_event,
};
pub use headers::{
    CALL_DEPTH_HEADER, CHILD_CORRELATION_ID_HEADER, CORRELATION_ID_HEADER, FAN_OUT_HEADER,
    call_depth, correlation_id_from, header_get, is_fan_out, mint_correlation_id,
};
pub use shape::{EventShape, ORCHESTRATED_TYPE, OrchestratedBody, detect};
