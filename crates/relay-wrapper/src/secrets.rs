//! The secret-store port.
//!
//! Handlers fetch service credentials through this seam; the concrete
//! backend (a cloud secret manager) stays outside the workspace.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a secret backend.
#[derive(Debug, Clone, Error)]
pub enum SecretError {
    #[error("secret not found at {0}")]
    NotFound(String),

    #[error("secret backend error: {0}")]
    Backend(String),
}

/// Trait for secret backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the secret document stored at `path`.
    async fn fetch(&self, path: &str) -> Result<Value, SecretError>;
}

/// A secret store that can be shared across tasks.
pub type SharedSecrets = Arc<dyn SecretStore>;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory secret store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemorySecrets {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with one entry.
    pub fn with(path: impl Into<String>, value: Value) -> Self {
        let store = Self::new();
        store.insert(path, value);
        store
    }

    pub fn insert(&self, path: impl Into<String>, value: Value) {
        self.entries.lock().unwrap().insert(path.into(), value);
    }
}

#[async_trait]
impl SecretStore for MemorySecrets {
    async fn fetch(&self, path: &str) -> Result<Value, SecretError> {
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(path.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
