//! The language model collaborator contract.
//!
//! The engine never parses provider wire formats; it talks to models through
//! [`LanguageModel`] and leaves transport, retries, and protocol details to
//! the implementation behind the trait.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::error::Result;
use crate::llm::types::{ChatRequest, LmResponse};

/// A chat-capable language model.
///
/// Implementations must be safe to share across concurrent runs and must
/// honor the deadline and cancellation carried by the [`RunContext`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a conversation to the model and return the complete response.
    async fn chat(&self, ctx: &RunContext, request: &ChatRequest) -> Result<LmResponse>;

    /// Stream the response incrementally.
    ///
    /// Partial responses are sent through `output` in emission order; the
    /// sender is dropped when the stream ends, which closes the channel.
    /// Returning an error after dropping the sender fails the run.
    async fn stream(
        &self,
        ctx: &RunContext,
        request: &ChatRequest,
        output: mpsc::Sender<LmResponse>,
    ) -> Result<()>;
}
