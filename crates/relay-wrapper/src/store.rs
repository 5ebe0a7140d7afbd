//! The key-value-store port.
//!
//! The tracker publishes sequence status documents through this seam;
//! handlers can reach the same store through the context's factory handle.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a status-store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Trait for document stores addressed by path.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `document` at `path`, overwriting any previous value.
    async fn write(&self, path: &str, document: Value) -> Result<(), StoreError>;

    /// Read the document at `path`.
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError>;
}

/// A store that can be shared across tasks.
pub type SharedStore = Arc<dyn KeyValueStore>;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

/// An in-memory document store for tests and local runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of every document written so far.
    pub fn documents(&self) -> BTreeMap<String, Value> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn write(&self, path: &str, document: Value) -> Result<(), StoreError> {
        self.documents
            .lock()
            .unwrap()
            .insert(path.to_string(), document);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.lock().unwrap().get(path).cloned())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
