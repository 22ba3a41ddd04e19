//! Name-unique tool catalog with instrumented dispatch.
//!
//! Backed by [`DashMap`], which provides lock-free concurrent reads and
//! fine-grained write locking: lookups from parallel runs never contend with
//! each other, and registration takes an entry-level lock only.

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::json;

use crate::context::RunContext;
use crate::llm::types::ToolSpec;
use crate::observability::{attr, Metrics, NoopMetrics, NoopTracer, SpanStatus, Tracer};
use crate::tools::{Tool, ToolError, ToolResult};

/// A shared, dynamically dispatched tool.
pub type SharedTool = Arc<dyn Tool>;

/// Catalog of tools available to an agent.
///
/// Names are unique; registering an existing name fails.  Dispatch through
/// [`ToolRegistry::execute`] is instrumented with a `tool.execute` span and
/// latency/error metrics.
pub struct ToolRegistry {
    tools: DashMap<String, SharedTool>,
    tracer: Arc<dyn Tracer>,
    metrics: Arc<dyn Metrics>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create an empty registry with no-op observability.
    pub fn new() -> Self {
        Self {
            tools: DashMap::new(),
            tracer: Arc::new(NoopTracer),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replace the observability sinks used by dispatch.
    pub fn with_observability(
        mut self,
        tracer: Arc<dyn Tracer>,
        metrics: Arc<dyn Metrics>,
    ) -> Self {
        self.tracer = tracer;
        self.metrics = metrics;
        self
    }

    /// Register a tool.  Fails on an empty name or a duplicate.
    pub fn register<T>(&self, tool: T) -> ToolResult<()>
    where
        T: Tool + 'static,
    {
        self.register_shared(Arc::new(tool))
    }

    /// Register an already-shared tool.
    pub fn register_shared(&self, tool: SharedTool) -> ToolResult<()> {
        let name = tool.name().trim().to_owned();
        if name.is_empty() {
            return Err(ToolError::Invalid {
                reason: "tool name cannot be empty".into(),
            });
        }

        match self.tools.entry(name) {
            Entry::Occupied(entry) => Err(ToolError::Duplicate {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                tracing::debug!(tool = %entry.key(), "tool registered");
                entry.insert(tool);
                Ok(())
            }
        }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// All registered tool names, sorted for stable iteration.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// The definitions advertised to the model, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.iter().map(|e| e.value().spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry has no tools.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name with the given input.
    ///
    /// Instrumented with a `tool.execute` span carrying the tool name; the
    /// dispatch latency is recorded, and failures record a `tool_error`
    /// metric and set the span status to error.
    pub async fn execute(&self, ctx: &RunContext, name: &str, input: &str) -> ToolResult<String> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_owned(),
        })?;

        let mut span = self.tracer.start_span("tool.execute");
        span.set_attribute(attr::TOOL_NAME, json!(name));
        let labels = [("tool_name", name)];

        let start = Instant::now();
        let result = tool.execute(ctx, input).await;
        self.metrics.record_latency(start.elapsed(), &labels);

        match &result {
            Ok(_) => span.set_status(SpanStatus::Ok, ""),
            Err(e) => {
                self.metrics.record_error("tool_error", &labels);
                span.set_status(SpanStatus::Error, &e.to_string());
                tracing::warn!(tool = %name, error = %e, "tool execution failed");
            }
        }
        span.end();

        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
