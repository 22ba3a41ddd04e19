//! Agent runtime for Braid.
//!
//! This crate implements the core of Braid: a bounded **reason-act loop**
//! that alternates between calling a language model and executing the tool
//! calls it requests, until the model produces a terminal answer or the
//! iteration budget is exhausted.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐    ┌─────────────┐    ┌──────────┐
//! │ Middleware │───>│  ChatAgent  │───>│ Registry │
//! │ (guard,obs)│    │ (run loop)  │    │ (tools)  │
//! └────────────┘    └──────┬──────┘    └──────────┘
//!                          │
//!              ┌───────────┼───────────┐
//!        ┌─────┴─────┐ ┌───┴────┐ ┌────┴─────┐
//!        │ LM client │ │ Memory │ │ Stream   │
//!        │ (chat)    │ │ (log)  │ │ (deltas) │
//!        └───────────┘ └────────┘ └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`runtime`] -- The [`Agent`] contract and the [`ChatAgent`] engine.
//! - [`llm`] -- LM types, the [`LanguageModel`] trait, and the Anthropic adapter.
//! - [`memory`] -- The conversation log contract and the in-process store.
//! - [`tools`] -- The tool contract and the instrumented registry.
//! - [`middleware`] -- Lifecycle hooks around LM and tool calls.
//! - [`guardrails`] -- Canonical input-filtering middleware.
//! - [`processors`] -- History transforms applied before prompt assembly.
//! - [`supervisor`] -- Sequential and fan-out composition of agents.
//! - [`agent_tool`] -- Wrap an agent behind the tool contract.
//! - [`observability`] -- Span and metric surfaces (no-ops by default).

pub mod agent_tool;
pub mod config;
pub mod context;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod middleware;
pub mod observability;
pub mod processors;
pub mod runtime;
pub mod supervisor;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use agent_tool::AgentTool;
pub use config::AgentConfig;
pub use context::RunContext;
pub use error::{AgentError, Result};
pub use guardrails::Guardrails;
pub use llm::{
    AnthropicClient, AnthropicConfig, ChatRequest, LanguageModel, LmResponse, Message, Role,
    ToolCall, ToolSpec, Usage,
};
pub use memory::{inmemory::InMemoryStore, MemoryStore, MemoryValue, CONVERSATION_KEY};
pub use middleware::Middleware;
pub use processors::{BudgetTrimmer, MemoryProcessor, RoleFilter};
pub use runtime::{Agent, ChatAgent};
pub use supervisor::{FanOutFirstPolicy, Policy, SequentialPolicy, Supervisor};
pub use tools::{extract_tool_input, registry::ToolRegistry, Tool, ToolError, ToolResult};
