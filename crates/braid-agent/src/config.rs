//! Agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Configuration for a single agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt injected as the first message of every LM request.
    #[serde(default)]
    pub system_prompt: String,

    /// Upper bound on reason-act iterations per run.  `0` is normalized to
    /// `1` at the start of a run.
    #[serde(default)]
    pub max_iterations: u32,

    /// Per-run timeout as a human-readable duration string (`"30s"`,
    /// `"2m"`).  `None` or empty means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl AgentConfig {
    /// The iteration bound with the zero case normalized away.
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.max(1)
    }

    /// Parse the configured timeout, if any.
    ///
    /// A malformed duration string is a fatal configuration error; the
    /// engine raises it before any LM or memory interaction.
    pub fn parse_timeout(&self) -> Result<Option<Duration>> {
        match self.timeout.as_deref() {
            None | Some("") => Ok(None),
            Some(value) => {
                humantime::parse_duration(value)
                    .map(Some)
                    .map_err(|e| AgentError::InvalidTimeout {
                        value: value.to_owned(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
