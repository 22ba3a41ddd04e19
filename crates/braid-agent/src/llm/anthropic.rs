//! Anthropic Messages API client.
//!
//! One concrete [`LanguageModel`] implementation.  Conversations are
//! serialized into typed request documents ([`Outbound`]), and replies come
//! back either as a single document ([`Inbound`]) or as a server-sent event
//! stream decoded by [`super::streaming`].  Tool results ride along as
//! user-role `tool_result` content blocks, which is how this wire links a
//! result back to the `tool_use` block that requested it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::llm::client::LanguageModel;
use crate::llm::streaming::{SseEvent, SseFeed};
use crate::llm::types::{ChatRequest, LmResponse, Message, Role, ToolCall, ToolSpec, Usage};

/// Messages endpoint, relative to the configured base URL.
const MESSAGES_PATH: &str = "/v1/messages";

/// Required `anthropic-version` header value.
const API_VERSION: &str = "2023-06-01";

/// Provider label recorded in response metadata.
const PROVIDER: &str = "anthropic";

/// Wall-clock cap on a single HTTP exchange.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Configuration and client
// ---------------------------------------------------------------------------

/// Connection settings for the Anthropic API.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL, overridable for proxies and compatible gateways.
    pub base_url: String,
    /// Model used when a request does not name one.
    pub model: String,
    /// Token ceiling used when a request does not set one.
    pub max_tokens: u32,
}

impl AnthropicConfig {
    /// Settings for the public API with library defaults.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.anthropic.com".to_owned(),
            model: model.into(),
            max_tokens: 4096,
        }
    }
}

/// A [`LanguageModel`] backed by the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    config: Arc<AnthropicConfig>,
    http: reqwest::Client,
}

impl AnthropicClient {
    /// Create a client.  An empty API key is rejected up front rather than
    /// on the first call.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(AgentError::MissingApiKey {
                provider: PROVIDER.into(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AgentError::LmRequestFailed {
                reason: format!("http client construction failed: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    /// The model for a request: per-request override or configured default.
    fn model_for<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        if request.model.is_empty() {
            &self.config.model
        } else {
            &request.model
        }
    }

    /// Response metadata common to both reply paths.
    fn reply_meta(&self, model: Option<&str>) -> HashMap<String, String> {
        HashMap::from([
            ("provider".to_owned(), PROVIDER.to_owned()),
            (
                "model".to_owned(),
                model.unwrap_or(&self.config.model).to_owned(),
            ),
        ])
    }

    /// Serialize and POST a request document, failing on transport errors
    /// and non-success statuses.
    async fn post_messages(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let outbound = Outbound::assemble(self, request, stream)?;
        tracing::debug!(model = outbound.model, stream, "dispatching Messages API call");

        let response = self
            .http
            .post(format!("{}{MESSAGES_PATH}", self.config.base_url))
            .header("x-api-key", self.config.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&outbound)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(AgentError::LmRequestFailed {
            reason: format!("messages endpoint returned {status}: {detail}"),
        })
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn chat(&self, ctx: &RunContext, request: &ChatRequest) -> Result<LmResponse> {
        ctx.check()?;

        let reply = self.post_messages(request, false).await?;
        let raw = reply.text().await.map_err(|e| AgentError::LmRequestFailed {
            reason: format!("reading reply body failed: {e}"),
        })?;

        let inbound: Inbound =
            serde_json::from_str(&raw).map_err(|e| AgentError::LmParseFailed {
                reason: format!("malformed reply document: {e}"),
            })?;

        let model = (!inbound.model.is_empty()).then(|| inbound.model.clone());
        let meta = self.reply_meta(model.as_deref());
        Ok(inbound.into_response(meta))
    }

    async fn stream(
        &self,
        ctx: &RunContext,
        request: &ChatRequest,
        output: mpsc::Sender<LmResponse>,
    ) -> Result<()> {
        ctx.check()?;

        let reply = self.post_messages(request, true).await?;

        let mut feed = SseFeed::new();
        let mut assembly = StreamingReply::default();
        let mut frames = reply.bytes_stream();

        while let Some(next) = frames.next().await {
            ctx.check()?;

            let bytes = next.map_err(|e| AgentError::LmStreamError {
                reason: format!("transport interrupted: {e}"),
            })?;
            let text = std::str::from_utf8(&bytes).map_err(|e| AgentError::LmStreamError {
                reason: format!("stream is not valid UTF-8: {e}"),
            })?;

            for event in feed.push(text)? {
                match event {
                    // Text goes straight out; everything else feeds the
                    // terminal chunk.
                    SseEvent::Text(fragment) => {
                        let delta = LmResponse {
                            content: fragment,
                            meta: self.reply_meta(assembly.model.as_deref()),
                            ..LmResponse::default()
                        };
                        if output.send(delta).await.is_err() {
                            // Receiver went away; nothing left to deliver.
                            return Ok(());
                        }
                    }
                    SseEvent::Closed => {
                        let _ = output.send(assembly.finish(self)?).await;
                        return Ok(());
                    }
                    other => assembly.observe(other),
                }
            }
        }

        // Transport ended without a close frame; report what arrived.
        let _ = output.send(assembly.finish(self)?).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Streaming reply assembly
// ---------------------------------------------------------------------------

/// State carried across stream events: reply metadata, token counts, and
/// tool calls assembled from interleaved input fragments.
#[derive(Debug, Default)]
struct StreamingReply {
    model: Option<String>,
    stop_reason: Option<String>,
    input_tokens: u32,
    output_tokens: u32,
    calls: Vec<PartialCall>,
}

/// A tool call whose JSON input is still accumulating.
#[derive(Debug)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

impl StreamingReply {
    fn observe(&mut self, event: SseEvent) {
        match event {
            SseEvent::Opened {
                model,
                input_tokens,
            } => {
                self.model = Some(model);
                self.input_tokens = input_tokens;
            }
            SseEvent::ToolUseStarted { id, name } => self.calls.push(PartialCall {
                id,
                name,
                arguments: String::new(),
            }),
            SseEvent::ToolInputFragment(fragment) => {
                if let Some(call) = self.calls.last_mut() {
                    call.arguments.push_str(&fragment);
                }
            }
            SseEvent::Completed {
                stop_reason,
                output_tokens,
            } => {
                self.stop_reason = stop_reason;
                self.output_tokens = output_tokens;
            }
            SseEvent::Text(_) | SseEvent::Closed => {}
        }
    }

    /// Build the terminal chunk: no content of its own, but the stop
    /// reason, token counts, and fully assembled tool calls.
    fn finish(self, client: &AnthropicClient) -> Result<LmResponse> {
        let mut tool_calls = Vec::with_capacity(self.calls.len());
        for call in self.calls {
            let arguments = if call.arguments.is_empty() {
                "{}".to_owned()
            } else {
                // The fragments must add up to one valid JSON document.
                serde_json::from_str::<Value>(&call.arguments).map_err(|e| {
                    AgentError::LmParseFailed {
                        reason: format!("tool call `{}` carries broken JSON input: {e}", call.name),
                    }
                })?;
                call.arguments
            };
            tool_calls.push(ToolCall {
                id: call.id,
                name: call.name,
                arguments,
            });
        }

        Ok(LmResponse {
            tool_calls,
            finish_reason: self.stop_reason,
            usage: Some(Usage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
            }),
            meta: client.reply_meta(self.model.as_deref()),
            ..LmResponse::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound documents
// ---------------------------------------------------------------------------

/// The request document for the Messages endpoint.
#[derive(Debug, Serialize)]
struct Outbound<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<OutboundMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OutboundTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage {
    role: &'static str,
    content: OutboundContent,
}

/// Plain string for simple turns, content blocks where the wire demands
/// structure.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OutboundContent {
    Plain(String),
    Blocks(Vec<OutboundBlock>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutboundBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Debug, Serialize)]
struct OutboundTool<'a> {
    name: &'a str,
    description: &'a str,
    input_schema: &'a Value,
}

impl<'a> Outbound<'a> {
    /// Translate a [`ChatRequest`] into the wire document.
    fn assemble(
        client: &'a AnthropicClient,
        request: &'a ChatRequest,
        stream: bool,
    ) -> Result<Self> {
        // This wire keeps instructions out of the message array; collect
        // them into the dedicated `system` slot instead.
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::with_capacity(request.messages.len());

        for turn in &request.messages {
            match turn.role {
                Role::System => system_parts.push(&turn.content),
                Role::User => messages.push(OutboundMessage {
                    role: "user",
                    content: OutboundContent::Plain(turn.content.clone()),
                }),
                Role::Assistant => messages.push(encode_assistant(turn)),
                Role::Tool => messages.push(encode_tool_result(turn)?),
            }
        }

        Ok(Self {
            model: client.model_for(request),
            max_tokens: request.max_tokens.unwrap_or(client.config.max_tokens),
            messages,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n")),
            temperature: request.temperature,
            tools: request.tools.iter().map(OutboundTool::from).collect(),
            stream: stream.then_some(true),
        })
    }
}

impl<'a> From<&'a ToolSpec> for OutboundTool<'a> {
    fn from(spec: &'a ToolSpec) -> Self {
        Self {
            name: &spec.name,
            description: &spec.description,
            input_schema: &spec.schema,
        }
    }
}

/// Assistant turns carrying tool calls become `text` + `tool_use` blocks;
/// plain ones stay a bare string.
fn encode_assistant(turn: &Message) -> OutboundMessage {
    if turn.tool_calls.is_empty() {
        return OutboundMessage {
            role: "assistant",
            content: OutboundContent::Plain(turn.content.clone()),
        };
    }

    let mut blocks = Vec::with_capacity(turn.tool_calls.len() + 1);
    if !turn.content.is_empty() {
        blocks.push(OutboundBlock::Text {
            text: turn.content.clone(),
        });
    }
    for call in &turn.tool_calls {
        blocks.push(OutboundBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: serde_json::from_str(&call.arguments)
                .unwrap_or_else(|_| Value::String(call.arguments.clone())),
        });
    }

    OutboundMessage {
        role: "assistant",
        content: OutboundContent::Blocks(blocks),
    }
}

/// Tool results are user-role `tool_result` blocks on this wire.
fn encode_tool_result(turn: &Message) -> Result<OutboundMessage> {
    let tool_use_id = turn
        .tool_call_id
        .clone()
        .ok_or_else(|| AgentError::LmRequestFailed {
            reason: "tool turn is missing its tool_call_id".into(),
        })?;

    Ok(OutboundMessage {
        role: "user",
        content: OutboundContent::Blocks(vec![OutboundBlock::ToolResult {
            tool_use_id,
            content: turn.content.clone(),
        }]),
    })
}

// ---------------------------------------------------------------------------
// Inbound documents
// ---------------------------------------------------------------------------

/// A complete (non-streaming) reply document.
#[derive(Debug, Deserialize)]
struct Inbound {
    #[serde(default)]
    model: String,
    content: Vec<InboundBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<InboundUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum InboundBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Ignored,
}

#[derive(Debug, Deserialize)]
struct InboundUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl Inbound {
    fn into_response(self, meta: HashMap<String, String>) -> LmResponse {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in self.content {
            match block {
                InboundBlock::Text { text } => content.push_str(&text),
                InboundBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    name,
                    arguments: input.to_string(),
                }),
                InboundBlock::Ignored => {}
            }
        }

        LmResponse {
            content,
            tool_calls,
            finish_reason: self.stop_reason,
            usage: self.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            meta,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
