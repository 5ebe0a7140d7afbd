//! Header conventions carried between invocations.
//!
//! Correlation identity travels in `X-Correlation-Id`; fan-out descendants
//! are marked with `X-Fan-Out` and a per-child `X-Child-CorrelationId`; the
//! self-invocation count travels in `X-Call-Depth`.

use std::collections::BTreeMap;

use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";
pub const FAN_OUT_HEADER: &str = "X-Fan-Out";
pub const CHILD_CORRELATION_ID_HEADER: &str = "X-Child-CorrelationId";
pub const CALL_DEPTH_HEADER: &str = "X-Call-Depth";

/// Mint a fresh correlation id for a sequence that arrived without one.
pub fn mint_correlation_id() -> String {
    format!("c-{}", Uuid::new_v4())
}

/// Case-insensitive header lookup.
pub fn header_get<'a>(headers: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// The inbound correlation id, when one was propagated.
pub fn correlation_id_from(headers: &BTreeMap<String, String>) -> Option<String> {
    header_get(headers, CORRELATION_ID_HEADER).map(str::to_string)
}

/// Whether this invocation is a fan-out descendant.
pub fn is_fan_out(headers: &BTreeMap<String, String>) -> bool {
    header_get(headers, FAN_OUT_HEADER).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

/// The self-invocation count carried on the inbound headers, zero if absent
/// or unparseable.
pub fn call_depth(headers: &BTreeMap<String, String>) -> u32 {
    header_get(headers, CALL_DEPTH_HEADER)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_minted_ids_are_unique() {
        let a = mint_correlation_id();
        let b = mint_correlation_id();
        assert_ne!(a, b);
        assert!(a.starts_with("c-"));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let h = headers(&[("x-correlation-id", "c-9")]);
        assert_eq!(correlation_id_from(&h).as_deref(), Some("c-9"));
        assert_eq!(header_get(&h, "X-CORRELATION-ID"), Some("c-9"));
    }

    #[test]
    fn test_fan_out_marker() {
        assert!(is_fan_out(&headers(&[("X-Fan-Out", "true")])));
        assert!(is_fan_out(&headers(&[("x-fan-out", "TRUE")])));
        assert!(!is_fan_out(&headers(&[("X-Fan-Out", "false")])));
        assert!(!is_fan_out(&headers(&[])));
    }

    #[test]
    fn test_call_depth_parsing() {
        assert_eq!(call_depth(&headers(&[("X-Call-Depth", "3")])), 3);
        assert_eq!(call_depth(&headers(&[("X-Call-Depth", "nope")])), 0);
        assert_eq!(call_depth(&headers(&[])), 0);
    }
}
