//! The agent execution engine.
//!
//! Implements the **reason-act loop** that drives an agent: the engine sends
//! the conversation to the LM, and when the model responds with tool calls,
//! executes them and feeds the results back.  This continues until the model
//! produces a terminal text response or the iteration bound is hit.
//!
//! Ordering guarantees, per run:
//!
//! 1. The input turn is appended to the conversation log before the first
//!    LM call.
//! 2. Tool results land in the log between LM calls, so the next call
//!    observes them.
//! 3. The final assistant turn is appended before `after_run` hooks fire
//!    and before `run` returns.
//!
//! Tool failures are demoted to conversation content (`"error: ..."`), and
//! unknown tool references are demoted to span events; everything else is
//! fatal and surfaces to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::context::RunContext;
use crate::error::{AgentError, Result};
use crate::llm::client::LanguageModel;
use crate::llm::types::{ChatRequest, LmResponse, Message};
use crate::memory::{MemoryStore, MemoryValue, CONVERSATION_KEY};
use crate::middleware::Middleware;
use crate::observability::{attr, Metrics, NoopMetrics, NoopTracer, Span, SpanStatus, Tracer};
use crate::processors::MemoryProcessor;
use crate::tools::registry::ToolRegistry;
use crate::tools::extract_tool_input;

// ---------------------------------------------------------------------------
// Agent contract
// ---------------------------------------------------------------------------

/// The core interface every agent exposes.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Execute one reason-act loop and return the final assistant turn.
    async fn run(&self, ctx: &RunContext, input: Message) -> Result<Message>;

    /// Execute the loop in streaming mode.
    ///
    /// Incremental deltas (tagged `meta["streaming"]="true"`) and one final
    /// aggregated assistant message are written to `output`; the channel is
    /// closed exactly once, on every exit path.
    async fn run_stream(
        &self,
        ctx: &RunContext,
        input: Message,
        output: mpsc::Sender<Message>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// ChatAgent
// ---------------------------------------------------------------------------

/// The default [`Agent`] implementation.
///
/// Construction wires the collaborators; the processor and middleware lists
/// are immutable afterwards.  A `ChatAgent` holds no mutable cross-run state
/// beyond what it writes to memory, so one instance can serve parallel runs.
pub struct ChatAgent {
    model: Arc<dyn LanguageModel>,
    config: AgentConfig,
    tools: Option<Arc<ToolRegistry>>,
    memory: Option<Arc<dyn MemoryStore>>,
    processors: Vec<Arc<dyn MemoryProcessor>>,
    middleware: Vec<Arc<dyn Middleware>>,
    tracer: Arc<dyn Tracer>,
    metrics: Arc<dyn Metrics>,
}

impl ChatAgent {
    /// Create an agent with no tools, no memory, and no-op observability.
    pub fn new(model: Arc<dyn LanguageModel>, config: AgentConfig) -> Self {
        Self {
            model,
            config,
            tools: None,
            memory: None,
            processors: Vec::new(),
            middleware: Vec::new(),
            tracer: Arc::new(NoopTracer),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Attach a tool registry.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Attach a conversation memory store.
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Append a memory processor.  Processors run in registration order.
    pub fn with_processor(mut self, processor: Arc<dyn MemoryProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Append a middleware.  Hooks run in registration order.
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Replace the observability sinks.
    pub fn with_observability(
        mut self,
        tracer: Arc<dyn Tracer>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        self.tracer = tracer;
        self.metrics = metrics;
        self
    }

    // -----------------------------------------------------------------------
    // Internal: shared run plumbing
    // -----------------------------------------------------------------------

    /// Derive the run context, honoring the configured timeout.
    ///
    /// A malformed timeout string fails here, before any LM or memory
    /// interaction.
    fn derive_context(&self, ctx: &RunContext) -> Result<RunContext> {
        Ok(match self.config.parse_timeout()? {
            Some(timeout) => ctx.child_with_timeout(timeout),
            None => ctx.clone(),
        })
    }

    /// Read the conversation log, treating an absent key as empty history
    /// and promoting the legacy single-message shape to a sequence.
    async fn load_history(&self, ctx: &RunContext) -> Result<Vec<Message>> {
        let Some(store) = &self.memory else {
            return Ok(Vec::new());
        };

        match ctx.guard(store.retrieve(ctx, CONVERSATION_KEY)).await? {
            Ok(value) => Ok(value.into_messages()),
            Err(AgentError::MemoryKeyNotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Append one entry to the conversation log.
    ///
    /// Reads the current sequence and writes it back with exactly one
    /// additional tail entry.  No-op when the agent has no memory store.
    async fn append_to_log(&self, ctx: &RunContext, message: &Message) -> Result<()> {
        let Some(store) = &self.memory else {
            return Ok(());
        };

        let mut log = match ctx.guard(store.retrieve(ctx, CONVERSATION_KEY)).await? {
            Ok(value) => value.into_messages(),
            Err(AgentError::MemoryKeyNotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        log.push(message.clone());

        ctx.guard(store.store(ctx, CONVERSATION_KEY, MemoryValue::Sequence(log)))
            .await??;
        Ok(())
    }

    /// Run the processor chain over the history, each stage consuming its
    /// predecessor's output.
    fn apply_processors(&self, ctx: &RunContext, history: Vec<Message>) -> Vec<Message> {
        let mut out = history;
        for processor in &self.processors {
            out = processor.process(ctx, &out);
        }
        out
    }

    /// Assemble the working message list for the first iteration:
    /// system prompt, processed prior history, then the input turn.
    fn assemble_messages(
        &self,
        ctx: &RunContext,
        prior_history: Vec<Message>,
        input: Message,
    ) -> Vec<Message> {
        let history = self.apply_processors(ctx, prior_history);
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(&self.config.system_prompt));
        messages.extend(history);
        messages.push(input);
        messages
    }

    fn record_response_telemetry(&self, span: &mut dyn Span, response: &LmResponse) {
        if let Some(model) = response.meta.get("model") {
            span.set_attribute(attr::MODEL, json!(model));
        }
        if let Some(provider) = response.meta.get("provider") {
            span.set_attribute(attr::PROVIDER, json!(provider));
        }
        if let Some(reason) = &response.finish_reason {
            span.set_attribute(attr::FINISH_REASON, json!(reason));
        }
        if let Some(usage) = response.usage {
            span.set_attribute(attr::TOKENS_INPUT, json!(usage.input_tokens));
            span.set_attribute(attr::TOKENS_OUTPUT, json!(usage.output_tokens));
            self.metrics
                .increment_tokens(u64::from(usage.input_tokens), &[("direction", "input")]);
            self.metrics
                .increment_tokens(u64::from(usage.output_tokens), &[("direction", "output")]);
        }
    }

    // -----------------------------------------------------------------------
    // Internal: the reason-act loop
    // -----------------------------------------------------------------------

    async fn run_inner(
        &self,
        ctx: &RunContext,
        input: Message,
        span: &mut dyn Span,
    ) -> Result<Message> {
        let run_id = Uuid::now_v7();
        let ctx = self.derive_context(ctx)?;

        let max_iterations = self.config.effective_max_iterations();
        tracing::info!(
            run_id = %run_id,
            max_iterations,
            tool_count = self.tools.as_ref().map(|r| r.len()).unwrap_or(0),
            "starting agent run"
        );

        // The input lands in the log before the first LM call.
        let prior_history = self.load_history(&ctx).await?;
        self.append_to_log(&ctx, &input).await?;

        let mut messages = self.assemble_messages(&ctx, prior_history, input);
        let tool_specs = self.tools.as_ref().map(|r| r.specs()).unwrap_or_default();

        let mut last_response: Option<LmResponse> = None;

        for iteration in 0..max_iterations {
            tracing::debug!(run_id = %run_id, iteration, "reason step");

            let mut request = ChatRequest::new(messages.clone());
            request.tools = tool_specs.clone();

            for mw in &self.middleware {
                mw.before_lm_call(&ctx, &mut request).await?;
            }

            let response = match ctx.guard(self.model.chat(&ctx, &request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(source)) => {
                    return Err(AgentError::LmCallFailed {
                        source: Box::new(source),
                    })
                }
                Err(interrupted) => return Err(interrupted),
            };

            self.record_response_telemetry(span, &response);

            for mw in &self.middleware {
                mw.after_lm_response(&ctx, &response).await?;
            }

            if response.has_tool_calls() {
                if let Some(registry) = &self.tools {
                    tracing::debug!(
                        run_id = %run_id,
                        iteration,
                        tools = ?response.tool_calls.iter().map(|c| &c.name).collect::<Vec<_>>(),
                        "model requested tool calls"
                    );

                    // The assistant turn that requested the calls precedes
                    // its tool results, in the working list and in the log.
                    let assistant_turn = Message::assistant_with_tool_calls(
                        response.content.clone(),
                        response.tool_calls.clone(),
                    );
                    messages.push(assistant_turn.clone());
                    self.append_to_log(&ctx, &assistant_turn).await?;

                    for call in &response.tool_calls {
                        if registry.get(&call.name).is_none() {
                            tracing::warn!(
                                run_id = %run_id,
                                tool = %call.name,
                                "model requested unknown tool, skipping"
                            );
                            span.add_event("tool.not_found", json!({"tool": call.name}));
                            continue;
                        }

                        let input_str = extract_tool_input(&call.arguments);

                        for mw in &self.middleware {
                            mw.before_tool_execute(&ctx, &call.name, &input_str).await?;
                        }

                        let executed = ctx
                            .guard(registry.execute(&ctx, &call.name, &input_str))
                            .await?;
                        let (result_text, exec_error) = match executed {
                            Ok(result) => (result, None),
                            // The model observes the failure as content and
                            // may self-correct on the next iteration.
                            Err(error) => (format!("error: {error}"), Some(error)),
                        };

                        for mw in &self.middleware {
                            let _ = mw
                                .after_tool_execute(
                                    &ctx,
                                    &call.name,
                                    &result_text,
                                    exec_error.as_ref(),
                                )
                                .await;
                        }

                        let tool_turn = Message::tool_result(&call.id, result_text);
                        messages.push(tool_turn.clone());
                        self.append_to_log(&ctx, &tool_turn).await?;
                    }

                    last_response = Some(response);
                    continue;
                }
            }

            // No tool calls (or no registry to run them): terminal response.
            last_response = Some(response);
            break;
        }

        let response = last_response.ok_or(AgentError::NoResponse)?;
        let final_message = Message::assistant(response.content.clone());

        // When the loop ended at the iteration bound mid-tool-cycle, the
        // terminal response's content is already in the log as the last
        // assistant turn; appending it again would duplicate it.
        let already_logged = response.has_tool_calls() && self.tools.is_some();
        if !already_logged {
            self.append_to_log(&ctx, &final_message).await?;
        }

        for mw in &self.middleware {
            let _ = mw.after_run(&ctx, &final_message).await;
        }

        tracing::info!(run_id = %run_id, "agent run complete");
        Ok(final_message)
    }

    // -----------------------------------------------------------------------
    // Internal: the streaming loop
    // -----------------------------------------------------------------------

    async fn run_stream_inner(
        &self,
        ctx: &RunContext,
        input: Message,
        output: &mpsc::Sender<Message>,
        span: &mut dyn Span,
    ) -> Result<()> {
        let run_id = Uuid::now_v7();
        let ctx = self.derive_context(ctx)?;

        tracing::info!(run_id = %run_id, "starting streaming run");

        let prior_history = self.load_history(&ctx).await?;
        self.append_to_log(&ctx, &input).await?;

        let messages = self.assemble_messages(&ctx, prior_history, input);
        let mut request = ChatRequest::new(messages);
        request.tools = self.tools.as_ref().map(|r| r.specs()).unwrap_or_default();

        for mw in &self.middleware {
            mw.before_lm_call(&ctx, &mut request).await?;
        }

        // The LM worker forwards chunks into an internal channel and closes
        // it (by dropping the sender) when the stream ends.
        let (chunk_tx, mut chunk_rx) = mpsc::channel::<LmResponse>(32);
        let model = Arc::clone(&self.model);
        let worker_ctx = ctx.clone();
        let worker_request = request.clone();
        let worker =
            tokio::spawn(async move { model.stream(&worker_ctx, &worker_request, chunk_tx).await });

        let mut aggregated = String::new();

        loop {
            tokio::select! {
                biased;
                interrupted = ctx.interrupted() => {
                    // Dropping the receiver releases a worker stuck on send;
                    // the shared context cancels one stuck in the provider.
                    tracing::debug!(run_id = %run_id, "streaming run interrupted");
                    return Err(interrupted);
                }
                maybe_chunk = chunk_rx.recv() => {
                    let Some(chunk) = maybe_chunk else {
                        break;
                    };

                    if !chunk.content.is_empty() {
                        aggregated.push_str(&chunk.content);
                        let delta = Message::assistant(chunk.content.clone())
                            .with_meta("streaming", "true");
                        // Non-blocking offer: drop the delta rather than
                        // stall; the aggregated final is authoritative.
                        if let Err(mpsc::error::TrySendError::Full(_)) = output.try_send(delta) {
                            tracing::debug!(run_id = %run_id, "sink full, dropping delta");
                        }
                    }

                    self.record_response_telemetry(span, &chunk);
                    // Streaming treats after-hooks as observability only.
                    for mw in &self.middleware {
                        let _ = mw.after_lm_response(&ctx, &chunk).await;
                    }
                }
            }
        }

        match worker.await {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(AgentError::LmCallFailed {
                    source: Box::new(source),
                })
            }
            Err(join_error) => {
                return Err(AgentError::Internal(format!(
                    "stream worker panicked: {join_error}"
                )))
            }
        }

        if !aggregated.is_empty() {
            let final_message = Message::assistant(aggregated);
            // Persist before close so the log never lags the sink.
            self.append_to_log(&ctx, &final_message).await?;
            if output.send(final_message).await.is_err() {
                tracing::debug!(run_id = %run_id, "sink receiver dropped before final message");
            }
        }

        tracing::info!(run_id = %run_id, "streaming run complete");
        Ok(())
    }
}

/// Close a span with a status derived from the run result.
fn finish_span<T>(mut span: Box<dyn Span>, result: &Result<T>) {
    match result {
        Ok(_) => span.set_status(SpanStatus::Ok, ""),
        Err(e) => span.set_status(SpanStatus::Error, &e.to_string()),
    }
    span.end();
}

#[async_trait]
impl Agent for ChatAgent {
    async fn run(&self, ctx: &RunContext, input: Message) -> Result<Message> {
        self.metrics.increment_requests(&[("mode", "run")]);
        let mut span = self.tracer.start_span("agent.run");
        let result = self.run_inner(ctx, input, span.as_mut()).await;
        finish_span(span, &result);
        result
    }

    async fn run_stream(
        &self,
        ctx: &RunContext,
        input: Message,
        output: mpsc::Sender<Message>,
    ) -> Result<()> {
        self.metrics.increment_requests(&[("mode", "stream")]);
        let mut span = self.tracer.start_span("agent.run_stream");
        let result = self.run_stream_inner(ctx, input, &output, span.as_mut()).await;
        finish_span(span, &result);
        // `output` drops here, closing the sink on every exit path.
        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
