//! Span-info observation and metric derivation.
//!
//! The walker reports one [`SpanInfo`] per operation span; the
//! [`MetricObserver`] turns those into three instruments under the `synth`
//! scope so request rates, latency distributions and error counts show up
//! in whatever backend the injected meter provider feeds.

use crate::metrics::{Counter, Histogram, MeterProvider};
use crate::tracer::SpanKind;
use std::sync::Arc;
use std::time::Duration;

/// Instrumentation scope the derived instruments live under.
const SCOPE: &str = "synth";

const REQUEST_COUNT: &str = "synth.request.count";
const REQUEST_DURATION: &str = "synth.request.duration";
const ERROR_COUNT: &str = "synth.error.count";

/// Emission record for one completed operation span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanInfo {
    /// Service that executed the operation.
    pub service: String,
    /// Operation name.
    pub operation: String,
    /// Span duration.
    pub duration: Duration,
    /// Whether the span closed with an error status.
    pub is_error: bool,
    /// Span kind.
    pub kind: SpanKind,
}

/// Receives span info records; safe for concurrent callers.
pub trait SpanObserver: Send + Sync {
    /// Observes one completed span.
    fn observe(&self, info: &SpanInfo);
}

/// Derives request/duration/error instruments from span info.
pub struct MetricObserver {
    requests: Arc<dyn Counter>,
    durations: Arc<dyn Histogram>,
    errors: Arc<dyn Counter>,
}

impl MetricObserver {
    /// Creates the three instruments from a meter provider.
    #[must_use]
    pub fn new(provider: &dyn MeterProvider) -> Self {
        let meter = provider.meter(SCOPE);
        Self {
            requests: meter.u64_counter(REQUEST_COUNT),
            durations: meter.f64_histogram(REQUEST_DURATION, "ms"),
            errors: meter.u64_counter(ERROR_COUNT),
        }
    }
}

impl SpanObserver for MetricObserver {
    fn observe(&self, info: &SpanInfo) {
        let attributes = [
            ("service.name", info.service.as_str()),
            ("operation.name", info.operation.as_str()),
        ];

        self.requests.add(1, &attributes);

        // Nanoseconds to milliseconds with full sub-millisecond precision.
        #[allow(clippy::cast_precision_loss)]
        let millis = info.duration.as_nanos() as f64 / 1e6;
        self.durations.record(millis, &attributes);

        if info.is_error {
            self.errors.add(1, &attributes);
        }
    }
}
