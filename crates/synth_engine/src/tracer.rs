//! Tracer seam.
//!
//! The engine emits spans through these traits; the real exporter lives
//! behind whatever [`TracerProvider`] the caller injects. Two providers
//! ship with the crate: [`InMemoryTracerProvider`] collects finished spans
//! for inspection, and [`LogTracerProvider`] emits each finished span as a
//! `tracing` event so a run is observable without any backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use synth_topology::AttributeValue;
use tracing::debug;

/// The kind of span being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Handling a request from a caller.
    Server,
    /// Wrapping an outbound call to another operation.
    Client,
    /// An internal unit of work.
    Internal,
}

impl SpanKind {
    /// Returns the lowercase name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Client => "client",
            Self::Internal => "internal",
        }
    }
}

/// Status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanStatus {
    /// Status not set.
    #[default]
    Unset,
    /// The operation completed successfully.
    Ok,
    /// The operation resulted in an error.
    Error,
}

impl SpanStatus {
    /// Returns true if this status represents an error.
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }
}

/// Identity of a live span, linking children to their parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    /// Trace the span belongs to.
    pub trace_id: u64,
    /// The span's own id.
    pub span_id: u64,
}

/// A span under construction.
pub trait Span: Send {
    /// Returns this span's context for linking children.
    fn context(&self) -> SpanContext;

    /// Sets a typed attribute.
    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    /// Sets the span status.
    fn set_status(&mut self, status: SpanStatus);

    /// Closes the span at the given end time, consuming it.
    fn end(self: Box<Self>, at: SystemTime);
}

/// Starts spans under one instrumentation scope.
pub trait Tracer: Send + Sync {
    /// Starts a span at an explicit start time.
    fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        start: SystemTime,
        parent: Option<SpanContext>,
    ) -> Box<dyn Span>;
}

/// Hands out tracers keyed by instrumentation scope (the service name).
pub trait TracerProvider: Send + Sync {
    /// Returns the tracer for `scope`.
    fn tracer(&self, scope: &str) -> Arc<dyn Tracer>;
}

/// Monotonic trace/span id source shared by the shipped providers.
#[derive(Debug)]
struct IdGenerator {
    next_trace_id: AtomicU64,
    next_span_id: AtomicU64,
}

impl IdGenerator {
    fn new() -> Self {
        Self {
            next_trace_id: AtomicU64::new(1),
            next_span_id: AtomicU64::new(1),
        }
    }

    fn next_trace(&self) -> u64 {
        self.next_trace_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_span(&self) -> u64 {
        self.next_span_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A fully closed span as recorded by [`InMemoryTracerProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    /// Instrumentation scope the span was emitted under.
    pub scope: String,
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: SpanKind,
    /// Final status.
    pub status: SpanStatus,
    /// Start timestamp.
    pub start: SystemTime,
    /// End timestamp.
    pub end: SystemTime,
    /// Attributes set on the span.
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Trace the span belongs to.
    pub trace_id: u64,
    /// The span's own id.
    pub span_id: u64,
    /// Parent span id, absent for roots.
    pub parent_span_id: Option<u64>,
}

impl FinishedSpan {
    /// Returns the span's duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start).unwrap_or_default()
    }

    /// Returns true if the span closed with an error status.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// Returns true if this is a trace root (no parent).
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }
}

#[derive(Debug)]
struct SpanSink {
    ids: IdGenerator,
    finished: Mutex<Vec<FinishedSpan>>,
}

/// Collects every finished span in memory.
#[derive(Debug, Clone)]
pub struct InMemoryTracerProvider {
    sink: Arc<SpanSink>,
}

impl InMemoryTracerProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sink: Arc::new(SpanSink {
                ids: IdGenerator::new(),
                finished: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns a copy of every span finished so far.
    #[must_use]
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        self.sink
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of spans finished so far.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.sink
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for InMemoryTracerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TracerProvider for InMemoryTracerProvider {
    fn tracer(&self, scope: &str) -> Arc<dyn Tracer> {
        Arc::new(InMemoryTracer {
            scope: scope.to_string(),
            sink: Arc::clone(&self.sink),
        })
    }
}

struct InMemoryTracer {
    scope: String,
    sink: Arc<SpanSink>,
}

impl Tracer for InMemoryTracer {
    fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        start: SystemTime,
        parent: Option<SpanContext>,
    ) -> Box<dyn Span> {
        let span_id = self.sink.ids.next_span();
        let trace_id = parent.map_or_else(|| self.sink.ids.next_trace(), |p| p.trace_id);
        Box::new(InMemorySpan {
            scope: self.scope.clone(),
            name: name.to_string(),
            kind,
            status: SpanStatus::Unset,
            start,
            attributes: BTreeMap::new(),
            context: SpanContext { trace_id, span_id },
            parent_span_id: parent.map(|p| p.span_id),
            sink: Arc::clone(&self.sink),
        })
    }
}

struct InMemorySpan {
    scope: String,
    name: String,
    kind: SpanKind,
    status: SpanStatus,
    start: SystemTime,
    attributes: BTreeMap<String, AttributeValue>,
    context: SpanContext,
    parent_span_id: Option<u64>,
    sink: Arc<SpanSink>,
}

impl Span for InMemorySpan {
    fn context(&self) -> SpanContext {
        self.context
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.attributes.insert(key.to_string(), value);
    }

    fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    fn end(self: Box<Self>, at: SystemTime) {
        let span = FinishedSpan {
            scope: self.scope,
            name: self.name,
            kind: self.kind,
            status: self.status,
            start: self.start,
            end: at,
            attributes: self.attributes,
            trace_id: self.context.trace_id,
            span_id: self.context.span_id,
            parent_span_id: self.parent_span_id,
        };
        self.sink
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}

/// Emits every finished span as a `tracing` debug event.
#[derive(Debug, Clone)]
pub struct LogTracerProvider {
    ids: Arc<IdGenerator>,
}

impl LogTracerProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ids: Arc::new(IdGenerator::new()),
        }
    }
}

impl Default for LogTracerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TracerProvider for LogTracerProvider {
    fn tracer(&self, scope: &str) -> Arc<dyn Tracer> {
        Arc::new(LogTracer {
            scope: scope.to_string(),
            ids: Arc::clone(&self.ids),
        })
    }
}

struct LogTracer {
    scope: String,
    ids: Arc<IdGenerator>,
}

impl Tracer for LogTracer {
    fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        start: SystemTime,
        parent: Option<SpanContext>,
    ) -> Box<dyn Span> {
        let span_id = self.ids.next_span();
        let trace_id = parent.map_or_else(|| self.ids.next_trace(), |p| p.trace_id);
        Box::new(LogSpan {
            scope: self.scope.clone(),
            name: name.to_string(),
            kind,
            status: SpanStatus::Unset,
            start,
            context: SpanContext { trace_id, span_id },
        })
    }
}

struct LogSpan {
    scope: String,
    name: String,
    kind: SpanKind,
    status: SpanStatus,
    start: SystemTime,
    context: SpanContext,
}

impl Span for LogSpan {
    fn context(&self) -> SpanContext {
        self.context
    }

    fn set_attribute(&mut self, _key: &str, _value: AttributeValue) {}

    fn set_status(&mut self, status: SpanStatus) {
        self.status = status;
    }

    fn end(self: Box<Self>, at: SystemTime) {
        let duration = at.duration_since(self.start).unwrap_or_default();
        let duration_us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        debug!(
            target: "synth::spans",
            scope = %self.scope,
            name = %self.name,
            kind = SpanKind::as_str(self.kind),
            trace_id = self.context.trace_id,
            span_id = self.context.span_id,
            duration_us,
            error = self.status.is_error(),
            "span"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_spans_open_new_traces() {
        let provider = InMemoryTracerProvider::new();
        let tracer = provider.tracer("gateway");

        let first = tracer.start_span("a", SpanKind::Server, SystemTime::now(), None);
        let second = tracer.start_span("b", SpanKind::Server, SystemTime::now(), None);
        assert_ne!(first.context().trace_id, second.context().trace_id);

        first.end(SystemTime::now());
        second.end(SystemTime::now());
        assert_eq!(provider.span_count(), 2);
    }

    #[test]
    fn children_inherit_the_trace() {
        let provider = InMemoryTracerProvider::new();
        let tracer = provider.tracer("gateway");

        let start = SystemTime::now();
        let parent = tracer.start_span("parent", SpanKind::Server, start, None);
        let parent_context = parent.context();
        let child = tracer.start_span(
            "child",
            SpanKind::Client,
            start,
            Some(parent_context),
        );

        assert_eq!(child.context().trace_id, parent_context.trace_id);
        assert_ne!(child.context().span_id, parent_context.span_id);

        child.end(start + Duration::from_millis(5));
        parent.end(start + Duration::from_millis(10));

        let spans = provider.finished_spans();
        let child_span = spans.iter().find(|s| s.name == "child").unwrap();
        assert_eq!(child_span.parent_span_id, Some(parent_context.span_id));
        assert!(!child_span.is_root());
        assert_eq!(child_span.duration(), Duration::from_millis(5));
    }

    #[test]
    fn attributes_and_status_are_recorded() {
        let provider = InMemoryTracerProvider::new();
        let tracer = provider.tracer("backend");

        let start = SystemTime::now();
        let mut span = tracer.start_span("list", SpanKind::Internal, start, None);
        span.set_attribute("db.rows", AttributeValue::Int(42));
        span.set_status(SpanStatus::Error);
        span.end(start + Duration::from_millis(1));

        let spans = provider.finished_spans();
        assert_eq!(spans[0].attributes["db.rows"], AttributeValue::Int(42));
        assert!(spans[0].is_error());
        assert_eq!(spans[0].scope, "backend");
    }
}
