//! Language model types, the [`LanguageModel`] contract, and the Anthropic
//! provider adapter.

pub mod anthropic;
pub mod client;
pub mod streaming;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::LanguageModel;
pub use types::{ChatRequest, LmResponse, Message, Role, ToolCall, ToolSpec, Usage};
