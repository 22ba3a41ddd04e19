//! Conversation memory: the store contract and the conversation-log value
//! shape.
//!
//! The engine keeps the conversation log under the fixed key
//! [`CONVERSATION_KEY`].  Appending an entry is a read-append-store sequence,
//! so the store contract below requires at least per-operation atomicity;
//! backends without append-list or compare-and-swap semantics may lose
//! entries when concurrent runs share one log.

pub mod inmemory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;
use crate::error::Result;
use crate::llm::types::Message;

/// Fixed key under which the engine stores the conversation log.
pub const CONVERSATION_KEY: &str = "conversation";

/// A value stored in agent memory.
///
/// The conversation log is normally a [`MemoryValue::Sequence`]; the
/// [`MemoryValue::Single`] variant exists for backends migrating data written
/// by older versions that stored a bare message under the log key.  Readers
/// normalize with [`MemoryValue::into_messages`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryValue {
    /// An ordered sequence of messages (the conversation log shape).
    Sequence(Vec<Message>),
    /// A single bare message (legacy shape, promoted on read).
    Single(Message),
}

impl MemoryValue {
    /// Normalize to a message sequence, promoting the legacy single-message
    /// shape to a one-element sequence.
    pub fn into_messages(self) -> Vec<Message> {
        match self {
            MemoryValue::Sequence(messages) => messages,
            MemoryValue::Single(message) => vec![message],
        }
    }
}

impl From<Vec<Message>> for MemoryValue {
    fn from(messages: Vec<Message>) -> Self {
        MemoryValue::Sequence(messages)
    }
}

/// Key-value storage for agent state.
///
/// Implementations must be safe to share across concurrent runs and must
/// provide at-least-per-operation atomicity.  The engine only uses `store`
/// and `retrieve` on [`CONVERSATION_KEY`]; the remaining operations exist for
/// backends and callers managing state directly.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Save a value under the given key, replacing any existing value.
    async fn store(&self, ctx: &RunContext, key: &str, value: MemoryValue) -> Result<()>;

    /// Fetch the value under the given key.
    ///
    /// Returns [`crate::AgentError::MemoryKeyNotFound`] when the key is
    /// absent; callers reading the conversation log treat that as an empty
    /// history.
    async fn retrieve(&self, ctx: &RunContext, key: &str) -> Result<MemoryValue>;

    /// Remove the value under the given key.  Removing an absent key is not
    /// an error.
    async fn delete(&self, ctx: &RunContext, key: &str) -> Result<()>;

    /// All keys currently stored.
    async fn list(&self, ctx: &RunContext) -> Result<Vec<String>>;

    /// Remove all stored values.
    async fn clear(&self, ctx: &RunContext) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
