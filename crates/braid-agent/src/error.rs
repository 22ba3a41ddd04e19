//! Agent error types.
//!
//! All runtime subsystems surface errors through [`AgentError`].  Each variant
//! carries enough context for callers to decide how to handle the failure.
//! Tool execution failures are deliberately *not* represented here: the engine
//! demotes them to conversation content so the model can self-correct (see
//! [`crate::tools::ToolError`] for the tool-side type).

/// Unified error type for the agent runtime.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    // -- Configuration errors ------------------------------------------------
    /// The configured timeout string could not be parsed as a duration.
    #[error("invalid timeout duration `{value}`: {reason}")]
    InvalidTimeout { value: String, reason: String },

    // -- Guardrail errors ----------------------------------------------------
    /// The request was rejected by an input guardrail.  `reason` is a
    /// user-safe reason code, never the offending content.
    #[error("request blocked by guardrails: {reason}")]
    GuardrailBlocked { reason: String },

    // -- LM errors -----------------------------------------------------------
    /// A language-model invocation made by the engine failed.  Wraps the
    /// collaborator error so the underlying kind stays inspectable.
    #[error("LM call failed: {source}")]
    LmCallFailed {
        #[source]
        source: Box<AgentError>,
    },

    /// An HTTP request to the LM provider failed.
    #[error("lm request failed: {reason}")]
    LmRequestFailed { reason: String },

    /// The LM response could not be parsed into the expected format.
    #[error("lm response parse error: {reason}")]
    LmParseFailed { reason: String },

    /// The streaming connection was interrupted or produced invalid data.
    #[error("lm stream error: {reason}")]
    LmStreamError { reason: String },

    /// The API key is missing for a provider that requires one.
    #[error("missing api key for provider: {provider}")]
    MissingApiKey { provider: String },

    /// A successful call yielded no terminal response (should not happen).
    #[error("no response from model")]
    NoResponse,

    // -- Memory errors -------------------------------------------------------
    /// A memory store operation failed structurally.
    #[error("memory error: {reason}")]
    Memory { reason: String },

    /// The requested key is absent.  The engine treats this as an empty
    /// conversation history; only structural errors are fatal.
    #[error("memory key not found: {key}")]
    MemoryKeyNotFound { key: String },

    // -- Cancellation --------------------------------------------------------
    /// The run context was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,

    /// The run deadline derived from the configured timeout expired.
    #[error("run deadline exceeded")]
    DeadlineExceeded,

    // -- Serialization -------------------------------------------------------
    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    // -- Generic -------------------------------------------------------------
    /// Catch-all for unexpected internal errors.  Prefer a typed variant
    /// whenever possible.
    #[error("internal agent error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the agent crate.
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        Self::LmRequestFailed {
            reason: err.to_string(),
        }
    }
}
