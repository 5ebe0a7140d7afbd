//! relay-tracker
//!
//! The distinguished handler that publishes sequence progress to an external
//! status store. Observers read one document per sequence at
//! `aws-orchestrate/<stage>/<correlationId>`, overwritten on each progression.
//!
//! The store itself is a port ([`relay_wrapper::KeyValueStore`]); connecting
//! to it requires service credentials fetched from the secret store at a
//! configurable path.

use serde::{Deserialize, Serialize};

use relay_errors::{Fault, FaultKind};
use relay_sequence::SequenceStatus;
use relay_wrapper::{SharedSecrets, SharedStore};

/// Default secret path for the status-store service account.
pub const DEFAULT_SECRET_PATH: &str = "firebase/SERVICE_ACCOUNT";

/// Root of every status document path.
pub const STATUS_ROOT: &str = "aws-orchestrate";

/// Environment variable naming the deployment stage.
pub const STAGE_ENV: &str = "AWS_STAGE";

/// Fallback stage variable.
pub const STAGE_FALLBACK_ENV: &str = "NODE_ENV";

/// The tracker's invocation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerInput {
    pub status: SequenceStatus,
    /// Secret path for the status-store credentials; defaults to
    /// [`DEFAULT_SECRET_PATH`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_location: Option<String>,
}

/// The tracker handler.
pub struct Tracker {
    secrets: SharedSecrets,
    store: SharedStore,
    stage: Option<String>,
}

impl Tracker {
    pub fn new(secrets: SharedSecrets, store: SharedStore) -> Self {
        Self {
            secrets,
            store,
            stage: None,
        }
    }

    /// Pin the stage instead of reading it from the environment.
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Record one progression report, overwriting the previous document for
    /// the same sequence. The output echoes the status.
    pub async fn handle(&self, input: TrackerInput) -> Result<SequenceStatus, Fault> {
        let stage = match &self.stage {
            Some(stage) => stage.clone(),
            None => resolve_stage()?,
        };

        let secret_path = input
            .secret_location
            .as_deref()
            .unwrap_or(DEFAULT_SECRET_PATH);
        let credentials = self.secrets.fetch(secret_path).await.map_err(|e| {
            Fault::new(
                FaultKind::ServerlessError,
                "tracker-credentials",
                500,
                format!("cannot fetch status-store credentials: {e}"),
            )
        })?;
        tracing::debug!(
            secret_path = %secret_path,
            has_credentials = !credentials.is_null(),
            "connecting to the status store"
        );

        let path = document_path(&stage, &input.status.correlation_id);
        let document = serde_json::to_value(&input.status).map_err(|e| {
            Fault::new(
                FaultKind::ServerlessError,
                "tracker-serialize",
                500,
                e.to_string(),
            )
        })?;
        self.store.write(&path, document).await.map_err(|e| {
            Fault::new(
                FaultKind::ServerlessError,
                "tracker-write",
                500,
                format!("cannot write status document at {path}: {e}"),
            )
        })?;
        tracing::debug!(path = %path, "status document written");

        Ok(input.status)
    }
}

/// The document path for a sequence's status.
pub fn document_path(stage: &str, correlation_id: &str) -> String {
    format!("{STATUS_ROOT}/{stage}/{correlation_id}")
}

/// The deployment stage: `AWS_STAGE`, falling back to `NODE_ENV`. Absence
/// is a fatal error.
pub fn resolve_stage() -> Result<String, Fault> {
    std::env::var(STAGE_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| {
            std::env::var(STAGE_FALLBACK_ENV)
                .ok()
                .filter(|v| !v.is_empty())
        })
        .ok_or_else(|| {
            Fault::new(
                FaultKind::ServerlessError,
                "tracker-stage",
                500,
                format!("neither {STAGE_ENV} nor {STAGE_FALLBACK_ENV} is set"),
            )
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
