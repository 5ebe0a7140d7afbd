//! Field compression for orchestrated envelopes.
//!
//! Envelope fields are UTF-8 JSON run through DEFLATE and base64, prefixed
//! with a marker so consumers can tell compressed from plain text. Small
//! payloads are passed through uncompressed — the overhead isn't worth it —
//! and decoding is tolerant of either form.

use std::io::{Read, Write};

use base64::{Engine, engine::general_purpose::STANDARD};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::{EnvelopeError, Result};

/// Marker prefix identifying a DEFLATE+base64 compressed field.
pub const DEFLATE_MARKER: &str = "dfl:";

/// Payloads shorter than this are sent uncompressed.
const MIN_COMPRESS_LEN: usize = 128;

/// Compress a field for the wire.
///
/// Returns the input unchanged when it is too small to be worth compressing.
pub fn compress(text: &str) -> Result<String> {
    if text.len() < MIN_COMPRESS_LEN {
        return Ok(text.to_string());
    }
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(text.as_bytes())
        .map_err(|e| EnvelopeError::Compress(e.to_string()))?;
    let bytes = encoder
        .finish()
        .map_err(|e| EnvelopeError::Compress(e.to_string()))?;
    Ok(format!("{DEFLATE_MARKER}{}", STANDARD.encode(bytes)))
}

/// Decompress a field from the wire.
///
/// Fields without the marker are returned unchanged.
pub fn decompress(text: &str) -> Result<String> {
    let Some(encoded) = text.strip_prefix(DEFLATE_MARKER) else {
        return Ok(text.to_string());
    };
    let bytes = STANDARD.decode(encoded)?;
    let mut decoder = DeflateDecoder::new(bytes.as_slice());
    let mut out = String::new();
    decoder
        .read_to_string(&mut out)
        .map_err(|e| EnvelopeError::Decompress(e.to_string()))?;
    Ok(out)
}

/// Decompress-then-parse an envelope field into JSON.
pub fn decode_json(text: &str) -> Result<serde_json::Value> {
    let plain = decompress(text)?;
    Ok(serde_json::from_str(&plain)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_small_payloads_pass_through() {
        let text = r#"{"n":2}"#;
        let packed = compress(text).unwrap();
        assert_eq!(packed, text);
        assert_eq!(decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_large_payloads_roundtrip_compressed() {
        let value = json!({"items": vec!["abcdefgh"; 64], "nested": {"deep": true}});
        let text = serde_json::to_string(&value).unwrap();
        let packed = compress(&text).unwrap();
        assert!(packed.starts_with(DEFLATE_MARKER));
        assert!(packed.len() < text.len());
        assert_eq!(decompress(&packed).unwrap(), text);
    }

    #[test]
    fn test_decode_json_tolerates_plain_fields() {
        let value = decode_json(r#"{"ok":true}"#).unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn test_decode_json_compressed_field() {
        let original = json!({"rows": vec![json!({"id": 1, "name": "a-fairly-long-name"}); 20]});
        let packed = compress(&serde_json::to_string(&original).unwrap()).unwrap();
        let decoded = decode_json(&packed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_corrupt_base64_is_an_error() {
        let err = decompress("dfl:!!not-base64!!").unwrap_err();
        assert!(matches!(err, EnvelopeError::Base64(_)));
    }

    #[test]
    fn test_corrupt_deflate_is_an_error() {
        let bogus = format!("{DEFLATE_MARKER}{}", STANDARD.encode(b"not deflate data"));
        let err = decompress(&bogus).unwrap_err();
        assert!(matches!(err, EnvelopeError::Decompress(_)));
    }
}
