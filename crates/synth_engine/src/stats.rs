//! Run statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Totals for one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Spans emitted, client wrappers included.
    pub spans: u64,
    /// Traces started.
    pub traces: u64,
    /// Operation spans that closed with an error status.
    pub errors: u64,
    /// Spans per second of real elapsed time.
    pub spans_per_sec: f64,
    /// Real elapsed wall time of the run.
    pub duration: Duration,
}

/// Lock-free counters shared between the scheduler and workers.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    spans: AtomicU64,
    traces: AtomicU64,
    errors: AtomicU64,
}

impl StatsRecorder {
    /// Counts one emitted span.
    pub fn record_span(&self) {
        self.spans.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one started trace.
    pub fn record_trace(&self) {
        self.traces.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one error span.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Produces final stats for a run that took `elapsed` real time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self, elapsed: Duration) -> Stats {
        let spans = self.spans.load(Ordering::Relaxed);
        let secs = elapsed.as_secs_f64();
        Stats {
            spans,
            traces: self.traces.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            spans_per_sec: if secs > 0.0 { spans as f64 / secs } else { 0.0 },
            duration: elapsed,
        }
    }
}
