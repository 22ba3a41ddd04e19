//! Canonical tool implementations for Braid agents.
//!
//! Each tool implements the [`braid_agent::Tool`] contract and can be
//! registered on any [`braid_agent::ToolRegistry`]:
//!
//! - [`CalculatorTool`] -- basic arithmetic over an `"op a [b]"` input.
//! - [`HttpRequestTool`] -- HTTP requests described as `METHOD|URL|BODY`.

pub mod calculator;
pub mod http_request;

pub use calculator::CalculatorTool;
pub use http_request::HttpRequestTool;
