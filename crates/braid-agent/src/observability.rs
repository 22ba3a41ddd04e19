//! Observability surface: spans and metrics.
//!
//! The runtime emits spans around agent runs and tool executions, and
//! counters/latency recordings through the [`Metrics`] trait.  Both default
//! to no-ops so the engine carries no telemetry dependency; exporters (OTel,
//! Prometheus) live outside this crate and plug in via these traits.
//! Structured `tracing` logs are emitted independently of this surface.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;

// ---------------------------------------------------------------------------
// Attribute keys
// ---------------------------------------------------------------------------

/// Canonical span attribute keys (aligned loosely with OTel GenAI
/// conventions).
pub mod attr {
    pub const MODEL: &str = "genai.model";
    pub const PROVIDER: &str = "genai.provider";
    pub const FINISH_REASON: &str = "genai.finish_reason";
    pub const TOKENS_INPUT: &str = "genai.tokens.input";
    pub const TOKENS_OUTPUT: &str = "genai.tokens.output";
    pub const TOOL_NAME: &str = "genai.tool.name";
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Span completion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error,
}

/// A tracing span opened by the runtime.
pub trait Span: Send {
    /// Set an attribute on the span.
    fn set_attribute(&mut self, key: &str, value: Value);

    /// Set the span status.
    fn set_status(&mut self, status: SpanStatus, message: &str);

    /// Record a point-in-time event with attributes.
    fn add_event(&mut self, name: &str, attributes: Value);

    /// Finish the span.  Calling `end` more than once is a no-op.
    fn end(&mut self);
}

/// Creates spans.  Implementations must be safe to share across runs.
pub trait Tracer: Send + Sync {
    fn start_span(&self, name: &str) -> Box<dyn Span>;
}

/// Counter and latency surface.  Implementations must be safe to share
/// across runs.
pub trait Metrics: Send + Sync {
    fn increment_requests(&self, labels: &[(&str, &str)]);
    fn record_latency(&self, latency: Duration, labels: &[(&str, &str)]);
    fn increment_tokens(&self, count: u64, labels: &[(&str, &str)]);
    fn record_error(&self, error_type: &str, labels: &[(&str, &str)]);
}

// ---------------------------------------------------------------------------
// No-op implementations (defaults)
// ---------------------------------------------------------------------------

/// Tracer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

/// Span produced by [`NoopTracer`].
#[derive(Debug, Default)]
pub struct NoopSpan;

impl Span for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: Value) {}
    fn set_status(&mut self, _status: SpanStatus, _message: &str) {}
    fn add_event(&mut self, _name: &str, _attributes: Value) {}
    fn end(&mut self) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

/// Metrics sink that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn increment_requests(&self, _labels: &[(&str, &str)]) {}
    fn record_latency(&self, _latency: Duration, _labels: &[(&str, &str)]) {}
    fn increment_tokens(&self, _count: u64, _labels: &[(&str, &str)]) {}
    fn record_error(&self, _error_type: &str, _labels: &[(&str, &str)]) {}
}

// ---------------------------------------------------------------------------
// In-memory implementations (development and tests)
// ---------------------------------------------------------------------------

/// A completed span captured by [`RecordingTracer`].
#[derive(Debug, Clone)]
pub struct SpanRecord {
    pub name: String,
    pub duration: Duration,
    pub status: SpanStatus,
    pub message: String,
    pub attributes: Vec<(String, Value)>,
    pub events: Vec<(String, Value)>,
}

/// Tracer that keeps completed spans in memory for inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<SpanRecord>>>,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all completed spans.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().expect("span store poisoned").clone()
    }
}

impl Tracer for RecordingTracer {
    fn start_span(&self, name: &str) -> Box<dyn Span> {
        Box::new(RecordingSpan {
            sink: Arc::clone(&self.spans),
            name: name.to_owned(),
            started_at: Instant::now(),
            status: SpanStatus::Unset,
            message: String::new(),
            attributes: Vec::new(),
            events: Vec::new(),
            ended: false,
        })
    }
}

struct RecordingSpan {
    sink: Arc<Mutex<Vec<SpanRecord>>>,
    name: String,
    started_at: Instant,
    status: SpanStatus,
    message: String,
    attributes: Vec<(String, Value)>,
    events: Vec<(String, Value)>,
    ended: bool,
}

impl Span for RecordingSpan {
    fn set_attribute(&mut self, key: &str, value: Value) {
        if !self.ended {
            self.attributes.push((key.to_owned(), value));
        }
    }

    fn set_status(&mut self, status: SpanStatus, message: &str) {
        if !self.ended {
            self.status = status;
            self.message = message.to_owned();
        }
    }

    fn add_event(&mut self, name: &str, attributes: Value) {
        if !self.ended {
            self.events.push((name.to_owned(), attributes));
        }
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let record = SpanRecord {
            name: std::mem::take(&mut self.name),
            duration: self.started_at.elapsed(),
            status: self.status,
            message: std::mem::take(&mut self.message),
            attributes: std::mem::take(&mut self.attributes),
            events: std::mem::take(&mut self.events),
        };
        self.sink.lock().expect("span store poisoned").push(record);
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        self.end();
    }
}

/// Metrics sink that accumulates simple totals in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingMetrics {
    inner: Arc<Mutex<MetricTotals>>,
}

#[derive(Debug, Default, Clone)]
pub struct MetricTotals {
    pub requests: u64,
    pub total_latency: Duration,
    pub latency_samples: u64,
    pub tokens: u64,
    pub errors: Vec<String>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> MetricTotals {
        self.inner.lock().expect("metric store poisoned").clone()
    }
}

impl Metrics for RecordingMetrics {
    fn increment_requests(&self, _labels: &[(&str, &str)]) {
        self.inner.lock().expect("metric store poisoned").requests += 1;
    }

    fn record_latency(&self, latency: Duration, _labels: &[(&str, &str)]) {
        let mut totals = self.inner.lock().expect("metric store poisoned");
        totals.total_latency += latency;
        totals.latency_samples += 1;
    }

    fn increment_tokens(&self, count: u64, _labels: &[(&str, &str)]) {
        self.inner.lock().expect("metric store poisoned").tokens += count;
    }

    fn record_error(&self, error_type: &str, _labels: &[(&str, &str)]) {
        self.inner
            .lock()
            .expect("metric store poisoned")
            .errors
            .push(error_type.to_owned());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
