//! Input guardrails.
//!
//! A [`Middleware`] that validates and mutates the outgoing LM request
//! before the model sees it: length capping, deny-list, and allow-list
//! checks against the last user message.  All other hooks are the trait
//! defaults.

use async_trait::async_trait;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::llm::types::{ChatRequest, Role};
use crate::middleware::Middleware;

/// Reason code attached to deny-list rejections.
pub const REASON_DENY_LIST: &str = "deny list match";

/// Reason code attached to allow-list rejections.
pub const REASON_ALLOW_LIST: &str = "no allow list match";

/// Substring-based input filtering with a length cap.
///
/// Checks apply to the last message of the request when it is user-role, in
/// order: truncation, deny list, allow list.  Substring matching is
/// case-insensitive; empty substrings are ignored.  Truncation counts
/// characters (never splitting a UTF-8 sequence) and is idempotent.
#[derive(Debug, Clone, Default)]
pub struct Guardrails {
    /// Reject the request if any of these substrings appears in the input.
    pub deny_substrings: Vec<String>,
    /// If non-empty, reject unless at least one of these substrings appears.
    pub allow_substrings: Vec<String>,
    /// Truncate input longer than this many characters; `0` disables.
    pub max_input_chars: usize,
}

impl Guardrails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set deny-list substrings.
    pub fn deny(mut self, substrings: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deny_substrings = substrings.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set allow-list substrings.
    pub fn allow(mut self, substrings: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allow_substrings = substrings.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the input length cap.
    pub fn max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = max;
        self
    }
}

#[async_trait]
impl Middleware for Guardrails {
    async fn before_lm_call(&self, _ctx: &RunContext, request: &mut ChatRequest) -> Result<()> {
        let Some(last) = request.messages.last_mut() else {
            return Ok(());
        };
        if last.role != Role::User {
            return Ok(());
        }

        // 1. Length cap.
        if self.max_input_chars > 0 && last.content.chars().count() > self.max_input_chars {
            last.content = last.content.chars().take(self.max_input_chars).collect();
        }

        let lowered = last.content.to_lowercase();

        // 2. Deny list.
        for substring in &self.deny_substrings {
            if substring.is_empty() {
                continue;
            }
            if lowered.contains(&substring.to_lowercase()) {
                tracing::warn!("input rejected by guardrail deny list");
                return Err(AgentError::GuardrailBlocked {
                    reason: REASON_DENY_LIST.into(),
                });
            }
        }

        // 3. Allow list.
        if !self.allow_substrings.is_empty() {
            let allowed = self
                .allow_substrings
                .iter()
                .filter(|s| !s.is_empty())
                .any(|s| lowered.contains(&s.to_lowercase()));
            if !allowed {
                tracing::warn!("input rejected by guardrail allow list");
                return Err(AgentError::GuardrailBlocked {
                    reason: REASON_ALLOW_LIST.into(),
                });
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
