//! Error types for the envelope codec.

use thiserror::Error;

/// Result type alias using the envelope error type.
pub type Result<T> = std::result::Result<T, EnvelopeError>;

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Compressing an envelope field failed.
    #[error("compression failed: {0}")]
    Compress(String),

    /// Decompressing an envelope field failed.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// A compressed field did not decode as base64.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An envelope field did not parse as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The event claims an envelope shape it does not have.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}
