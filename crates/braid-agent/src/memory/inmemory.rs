//! In-process memory store.
//!
//! The canonical backend for tests, examples, and single-process agents.
//! State lives in a `RwLock`-protected map; each operation is atomic, but
//! the read-append-store sequence the engine performs on the conversation
//! log is not, so concurrent runs sharing one log may interleave.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::memory::{MemoryStore, MemoryValue};

/// An in-process [`MemoryStore`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, MemoryValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn store(&self, _ctx: &RunContext, key: &str, value: MemoryValue) -> Result<()> {
        self.data.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn retrieve(&self, _ctx: &RunContext, key: &str) -> Result<MemoryValue> {
        self.data
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| AgentError::MemoryKeyNotFound {
                key: key.to_owned(),
            })
    }

    async fn delete(&self, _ctx: &RunContext, key: &str) -> Result<()> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, _ctx: &RunContext) -> Result<Vec<String>> {
        Ok(self.data.read().await.keys().cloned().collect())
    }

    async fn clear(&self, _ctx: &RunContext) -> Result<()> {
        self.data.write().await.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
