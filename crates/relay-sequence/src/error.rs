//! Error types for the sequence model.

use thiserror::Error;

/// Result type alias using the sequence error type.
pub type Result<T> = std::result::Result<T, SequenceError>;

/// Errors that can occur while building or advancing a sequence.
#[derive(Debug, Error)]
pub enum SequenceError {
    /// `next` was called but no assigned step remains.
    #[error("no assigned step remains in the sequence")]
    NoRemainingSteps,

    /// `on_error` / `on_condition` was used before any step was added.
    #[error("the sequence has no steps yet")]
    NoSteps,

    /// `ingest_steps` was called on a sequence that already has steps.
    #[error("steps were already ingested into this sequence")]
    StepsAlreadyPresent,

    /// A dynamic parameter referenced a response that does not exist.
    #[error("unresolved dynamic parameter '{key}': no response at '{path}'")]
    UnresolvedReference { key: String, path: String },

    /// An environment variable required for ARN expansion is missing.
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    /// The inbound envelope could not be decoded.
    #[error(transparent)]
    Envelope(#[from] relay_envelope::EnvelopeError),

    /// A downstream invocation failed.
    #[error(transparent)]
    Invoke(#[from] crate::invoker::InvokeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
