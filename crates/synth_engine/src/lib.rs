//! Paced simulation engine for synth.
//!
//! This crate provides:
//! - The tracer and meter seams the engine emits through, with in-memory
//!   and log-emitting implementations
//! - The paced scheduler and recursive trace walker with deterministic
//!   seeded randomness and bounded worker concurrency
//! - The metric observer deriving `synth.*` instruments from span info
//! - Run statistics
//!
//! # Example
//!
//! ```rust,ignore
//! use synth_engine::{Engine, EngineConfig, InMemoryTracerProvider};
//! use tokio_util::sync::CancellationToken;
//!
//! let tracers = InMemoryTracerProvider::new();
//! let engine = Engine::new(topology, pattern, scenarios,
//!     std::sync::Arc::new(tracers.clone()), None, EngineConfig::default());
//! let stats = engine.run(CancellationToken::new()).await?;
//! println!("{} spans", stats.spans);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod engine;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod stats;
pub mod tracer;

pub use engine::{Engine, EngineConfig};
pub use error::{Error, Result};
pub use metrics::{
    Counter, Histogram, HistogramData, InMemoryMeterProvider, Meter, MeterProvider, SeriesKey,
};
pub use observer::{MetricObserver, SpanInfo, SpanObserver};
pub use stats::{Stats, StatsRecorder};
pub use tracer::{
    FinishedSpan, InMemoryTracerProvider, LogTracerProvider, Span, SpanContext, SpanKind,
    SpanStatus, Tracer, TracerProvider,
};
