//! Agent-as-tool adapter.
//!
//! Wraps an [`Agent`] behind the [`Tool`] contract so one agent can delegate
//! to another through ordinary tool dispatch, enabling hierarchical
//! composition: the wrapped agent appears in the parent's tool catalog like
//! any other tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::context::RunContext;
use crate::llm::types::Message;
use crate::runtime::Agent;
use crate::tools::{Tool, ToolError, ToolResult};

/// A [`Tool`] that forwards its input to a wrapped agent's `run`.
pub struct AgentTool {
    name: String,
    description: String,
    agent: Arc<dyn Agent>,
}

impl AgentTool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        agent: Arc<dyn Agent>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            agent,
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"input": {"type": "string"}},
            "required": ["input"]
        })
    }

    async fn execute(&self, ctx: &RunContext, input: &str) -> ToolResult<String> {
        let output = self
            .agent
            .run(ctx, Message::user(input))
            .await
            .map_err(|e| ToolError::Execution {
                reason: e.to_string(),
            })?;
        Ok(output.content)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
