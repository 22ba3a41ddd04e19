//! Lifecycle middleware.
//!
//! Middleware interposes on the engine's lifecycle events without altering
//! control flow, except that `before_*` hooks and `after_lm_response` may
//! abort the run by returning an error.  Every hook has a default no-op
//! implementation, so middlewares override only what they need.
//!
//! Error semantics, enforced by the engine:
//!
//! - `before_lm_call`, `before_tool_execute`, `after_lm_response`: errors are
//!   fatal and propagate immediately; nothing downstream runs.
//! - `after_tool_execute`, `after_run`: errors are ignored, so observability
//!   hooks can never fail a run that already produced a result.
//!
//! Instances are shared across runs and must tolerate concurrent invocation.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::Result;
use crate::llm::types::{ChatRequest, LmResponse, Message};
use crate::tools::ToolError;

/// Hooks around the engine's lifecycle events.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Runs before each LM invocation.  May mutate the outgoing request.
    async fn before_lm_call(&self, _ctx: &RunContext, _request: &mut ChatRequest) -> Result<()> {
        Ok(())
    }

    /// Runs after each LM response.
    async fn after_lm_response(&self, _ctx: &RunContext, _response: &LmResponse) -> Result<()> {
        Ok(())
    }

    /// Runs before each tool execution.
    async fn before_tool_execute(
        &self,
        _ctx: &RunContext,
        _tool_name: &str,
        _input: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs after each tool execution, successful or not.  `result` is the
    /// string fed back to the model (the error-prefixed text on failure).
    async fn after_tool_execute(
        &self,
        _ctx: &RunContext,
        _tool_name: &str,
        _result: &str,
        _exec_error: Option<&ToolError>,
    ) -> Result<()> {
        Ok(())
    }

    /// Runs once after the final assistant turn is produced.
    async fn after_run(&self, _ctx: &RunContext, _final_message: &Message) -> Result<()> {
        Ok(())
    }
}
