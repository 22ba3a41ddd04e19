//! The tool contract and argument conventions.
//!
//! Tools are the "act" half of the reason-act loop.  Each tool exposes a
//! name, a description, and a JSON schema so the model knows how to call it,
//! plus an `execute` entry point taking a single input string (the v0
//! single-parameter convention, see [`extract_tool_input`]).

pub mod registry;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RunContext;
use crate::llm::types::ToolSpec;

/// Errors produced by tools and the tool registry.
///
/// Tool execution failures are non-fatal to the run: the engine stringifies
/// them into tool-role conversation content so the model can self-correct.
/// Registration failures surface to the caller at setup time.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// A tool with this name is already registered.
    #[error("tool `{name}` already registered")]
    Duplicate { name: String },

    /// No tool with this name exists in the registry.
    #[error("tool not found: {name}")]
    NotFound { name: String },

    /// The tool definition itself is unusable (e.g. empty name).
    #[error("invalid tool: {reason}")]
    Invalid { reason: String },

    /// The tool rejected its input.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The tool started but failed to produce a result.
    #[error("tool execution failed: {reason}")]
    Execution { reason: String },
}

/// Convenience alias for tool results.
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// A callable tool exposed to the model.
///
/// Implementations must be safe to invoke from concurrent runs and should
/// honor the cancellation and deadline carried by the [`RunContext`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's unique name.
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn schema(&self) -> Value;

    /// Run the tool with the given input string.
    async fn execute(&self, ctx: &RunContext, input: &str) -> ToolResult<String>;

    /// The definition advertised to the model.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            schema: self.schema(),
        }
    }
}

/// Extract the effective input string from a tool call's JSON arguments.
///
/// If the arguments decode to a JSON object with a string field `input`,
/// that string is used; otherwise the raw argument string is passed to the
/// tool verbatim.
pub fn extract_tool_input(arguments: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(arguments) {
        if let Some(Value::String(input)) = map.get("input") {
            return input.clone();
        }
    }
    arguments.to_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_input_field_from_object() {
        assert_eq!(extract_tool_input(r#"{"input":"hello"}"#), "hello");
    }

    #[test]
    fn falls_back_to_raw_string() {
        // Not an object.
        assert_eq!(extract_tool_input("add 1 2"), "add 1 2");
        // Object without a string `input` field.
        assert_eq!(extract_tool_input(r#"{"input":42}"#), r#"{"input":42}"#);
        assert_eq!(extract_tool_input(r#"{"query":"x"}"#), r#"{"query":"x"}"#);
        // Invalid JSON.
        assert_eq!(extract_tool_input("{broken"), "{broken");
    }
}
