//! Server-sent event decoding for the Anthropic streaming API.
//!
//! Every `data:` payload on this wire names itself through a `type` field,
//! so the decoder never has to pair `event:` labels with their payloads: it
//! deserializes each data line into a tagged [`Frame`] and keeps only the
//! frames the runtime acts on.  [`SseFeed`] owns line reassembly, since
//! network chunks split lines at arbitrary byte positions.

use serde::Deserialize;

use crate::error::{AgentError, Result};

/// A typed event decoded from the reply stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// First frame of a reply.  Input tokens are billed up front, so the
    /// count arrives here.
    Opened { model: String, input_tokens: u32 },

    /// The model began assembling a tool invocation.
    ToolUseStarted { id: String, name: String },

    /// A fragment of assistant text.
    Text(String),

    /// A fragment of the JSON input for the most recently started tool
    /// invocation.
    ToolInputFragment(String),

    /// Generation finished.
    Completed {
        stop_reason: Option<String>,
        output_tokens: u32,
    },

    /// End of stream.
    Closed,
}

/// Reassembles lines from raw chunk text and decodes them into events.
#[derive(Debug, Default)]
pub struct SseFeed {
    /// Unterminated tail carried over between pushes.
    tail: String,
}

impl SseFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb a chunk of stream text, decoding every line it completes.
    pub fn push(&mut self, chunk: &str) -> Result<Vec<SseEvent>> {
        self.tail.push_str(chunk);

        let mut events = Vec::new();
        while let Some(end) = self.tail.find('\n') {
            let line: String = self.tail.drain(..=end).collect();
            if let Some(event) = decode_line(line.trim_end())? {
                events.push(event);
            }
        }
        Ok(events)
    }
}

/// Decode a single line.
///
/// Everything except `data:` lines is dropped here: `event:` labels are
/// redundant with the payload's `type` field, and comments and keepalive
/// pings carry nothing the runtime needs.
fn decode_line(line: &str) -> Result<Option<SseEvent>> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.trim();

    // OpenAI-compatible gateways terminate with a bare sentinel instead of
    // a message_stop frame.
    if payload == "[DONE]" {
        return Ok(Some(SseEvent::Closed));
    }

    let frame: Frame =
        serde_json::from_str(payload).map_err(|e| AgentError::LmStreamError {
            reason: format!("undecodable SSE payload: {e}"),
        })?;
    Ok(frame.into_event())
}

// ---------------------------------------------------------------------------
// Wire frames
// ---------------------------------------------------------------------------

/// Raw frame shapes as they appear on the wire.  Frame kinds the runtime
/// has no use for (pings, block boundaries) collapse into `Ignored`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Frame {
    MessageStart {
        message: ReplyHead,
    },
    ContentBlockStart {
        content_block: BlockHead,
    },
    ContentBlockDelta {
        delta: Fragment,
    },
    MessageDelta {
        delta: ReplyTail,
        #[serde(default)]
        usage: TokenCounts,
    },
    MessageStop,
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
struct ReplyHead {
    #[serde(default)]
    model: String,
    #[serde(default)]
    usage: TokenCounts,
}

#[derive(Debug, Deserialize)]
struct ReplyTail {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TokenCounts {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockHead {
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Fragment {
    TextDelta {
        #[serde(default)]
        text: String,
    },
    InputJsonDelta {
        #[serde(default)]
        partial_json: String,
    },
    #[serde(other)]
    Ignored,
}

impl Frame {
    fn into_event(self) -> Option<SseEvent> {
        match self {
            Frame::MessageStart { message } => Some(SseEvent::Opened {
                model: message.model,
                input_tokens: message.usage.input_tokens,
            }),
            Frame::ContentBlockStart {
                content_block: BlockHead::ToolUse { id, name },
            } => Some(SseEvent::ToolUseStarted { id, name }),
            Frame::ContentBlockDelta {
                delta: Fragment::TextDelta { text },
            } => Some(SseEvent::Text(text)),
            Frame::ContentBlockDelta {
                delta: Fragment::InputJsonDelta { partial_json },
            } => Some(SseEvent::ToolInputFragment(partial_json)),
            Frame::MessageDelta { delta, usage } => Some(SseEvent::Completed {
                stop_reason: delta.stop_reason,
                output_tokens: usage.output_tokens,
            }),
            Frame::MessageStop => Some(SseEvent::Closed),
            Frame::ContentBlockStart { .. } | Frame::ContentBlockDelta { .. } | Frame::Ignored => {
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
