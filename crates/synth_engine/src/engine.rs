//! The paced simulation engine.
//!
//! A scheduler advances simulated time in fixed ticks, asks the traffic
//! pattern how many traces to start in each slice, and hands every trace
//! to a bounded worker pool. Workers walk the topology recursively,
//! emitting causally ordered spans with sampled timing.
//!
//! Randomness is deterministic for a given seed: the scheduler owns one
//! seeded stream for arrivals, and every trace derives its own `ChaCha8`
//! sub-stream from the engine seed and the trace index, so results do not
//! depend on worker interleaving.

use crate::error::{Error, Result};
use crate::observer::{SpanInfo, SpanObserver};
use crate::stats::{Stats, StatsRecorder};
use crate::tracer::{SpanContext, SpanKind, SpanStatus, Tracer, TracerProvider};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::Exp;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use synth_topology::{
    active_scenarios, resolve_overrides, AttributeValue, CallStyle, OpRef, Override, Scenario,
    Topology,
};
use synth_traffic::TrafficPattern;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use xxhash_rust::xxh64::xxh64;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Simulated run length.
    pub duration: Duration,
    /// Master seed for all randomness.
    pub seed: u64,
    /// Scheduler tick granularity.
    pub tick: Duration,
    /// Per-trace operation-span budget.
    pub max_spans_per_trace: u64,
    /// Worker pool size; derived from CPUs and base rate when `None`.
    pub workers: Option<usize>,
    /// Stagger between parallel siblings; zero keeps identical starts.
    pub parallel_jitter: Duration,
    /// How long to wait for in-flight traces after the scheduler stops.
    pub drain_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            seed: 42,
            tick: Duration::from_millis(10),
            max_spans_per_trace: 1000,
            workers: None,
            parallel_jitter: Duration::ZERO,
            drain_grace: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Sets the simulated run length.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the master seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the per-trace span budget.
    #[must_use]
    pub const fn with_max_spans_per_trace(mut self, max_spans: u64) -> Self {
        self.max_spans_per_trace = max_spans;
        self
    }

    /// Sets an explicit worker pool size.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Staggers parallel siblings by `jitter` per sibling index.
    #[must_use]
    pub const fn with_parallel_jitter(mut self, jitter: Duration) -> Self {
        self.parallel_jitter = jitter;
        self
    }
}

/// Drives trace arrivals against a topology and emits spans.
pub struct Engine {
    topology: Arc<Topology>,
    pattern: TrafficPattern,
    scenarios: Vec<Scenario>,
    tracers: Arc<dyn TracerProvider>,
    observer: Option<Arc<dyn SpanObserver>>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine over a built topology.
    #[must_use]
    pub fn new(
        topology: Topology,
        pattern: TrafficPattern,
        scenarios: Vec<Scenario>,
        tracers: Arc<dyn TracerProvider>,
        observer: Option<Arc<dyn SpanObserver>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            topology: Arc::new(topology),
            pattern,
            scenarios,
            tracers,
            observer,
            config,
        }
    }

    /// Runs the simulation until the configured duration elapses or the
    /// token is cancelled, then drains in-flight traces and returns the
    /// run totals.
    ///
    /// # Errors
    ///
    /// Returns an error only for unrecoverable start-time faults; runtime
    /// problems are logged and reflected in the stats instead.
    pub async fn run(&self, cancel: CancellationToken) -> Result<Stats> {
        if self.topology.roots.is_empty() {
            return Err(Error::NoRoots);
        }

        let workers = self
            .config
            .workers
            .unwrap_or_else(|| default_workers(self.pattern.base_rate()));
        let worker_permits = u32::try_from(workers).unwrap_or(u32::MAX);
        let tick = self.config.tick;
        let tick_secs = tick.as_secs_f64();
        let poisson = self.pattern.is_poisson();

        // One tracer per service, resolved up front; client spans reuse
        // the calling service's tracer.
        let tracers: Arc<BTreeMap<String, Arc<dyn Tracer>>> = Arc::new(
            self.topology
                .services
                .keys()
                .map(|name| (name.clone(), self.tracers.tracer(name)))
                .collect(),
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let recorder = Arc::new(StatsRecorder::default());
        let mut scheduler_rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let started = Instant::now();
        let mut elapsed = Duration::ZERO;
        let mut carry = 0.0_f64;
        let mut next_arrival: Option<Duration> = None;
        let mut trace_index: u64 = 0;
        let mut next_root: usize = 0;

        debug!(workers, ?tick, "engine starting");

        'scheduler: while elapsed < self.config.duration {
            tokio::select! {
                _ = interval.tick() => {}
                () = cancel.cancelled() => break 'scheduler,
            }

            let rate = self.pattern.rate(elapsed);
            let slice_end = elapsed + tick;

            let starts = if poisson {
                poisson_starts(&mut scheduler_rng, rate, elapsed, slice_end, &mut next_arrival)
            } else {
                accumulate_starts(rate, tick_secs, &mut carry)
            };

            if starts == 0 {
                elapsed = slice_end;
                continue;
            }

            let overrides = Arc::new(resolve_overrides(&active_scenarios(
                &self.scenarios,
                elapsed,
            )));

            for _ in 0..starts {
                let root = self.topology.roots[next_root % self.topology.roots.len()].clone();
                next_root += 1;
                let trace_seed = xxh64(&trace_index.to_le_bytes(), self.config.seed);
                trace_index += 1;

                // A bounded pool doubles as backpressure: when every
                // worker is busy the scheduler waits here instead of
                // queueing unboundedly.
                let permit = tokio::select! {
                    permit = Arc::clone(&semaphore).acquire_owned() => {
                        let Ok(permit) = permit else { break 'scheduler };
                        permit
                    }
                    () = cancel.cancelled() => break 'scheduler,
                };

                let walker = Walker {
                    topology: Arc::clone(&self.topology),
                    tracers: Arc::clone(&tracers),
                    observer: self.observer.clone(),
                    overrides: Arc::clone(&overrides),
                    cancel: cancel.clone(),
                    recorder: Arc::clone(&recorder),
                    max_spans: self.config.max_spans_per_trace,
                    parallel_jitter: self.config.parallel_jitter,
                };
                tokio::spawn(async move {
                    let _permit = permit;
                    walker.run(&root, trace_seed);
                });
            }

            elapsed = slice_end;
        }

        // Drain: once every permit is reacquirable, all workers finished.
        let drained = tokio::time::timeout(
            self.config.drain_grace,
            semaphore.acquire_many(worker_permits),
        )
        .await;
        if !matches!(drained, Ok(Ok(_))) {
            warn!("grace window elapsed before all workers drained");
        }

        let stats = recorder.snapshot(started.elapsed());
        debug!(
            spans = stats.spans,
            traces = stats.traces,
            errors = stats.errors,
            "engine finished"
        );
        Ok(stats)
    }
}

/// Default pool size: one worker per 100 traces/sec, bounded by the CPU
/// count and at least one.
fn default_workers(base_rate: f64) -> usize {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let by_rate = (base_rate / 100.0).floor() as usize;
    num_cpus::get().min(by_rate.max(1))
}

/// Fractional-accumulator arrivals: the remainder carries across ticks so
/// rates below one-per-tick are not systematically truncated away.
fn accumulate_starts(rate: f64, tick_secs: f64, carry: &mut f64) -> u64 {
    let exact = rate.mul_add(tick_secs, *carry);
    let whole = exact.floor();
    *carry = exact - whole;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let starts = whole.max(0.0) as u64;
    starts
}

/// Poisson arrivals: exponential inter-arrival gaps sampled at the current
/// rate; every arrival falling inside the slice starts a trace.
fn poisson_starts(
    rng: &mut ChaCha8Rng,
    rate: f64,
    slice_start: Duration,
    slice_end: Duration,
    next_arrival: &mut Option<Duration>,
) -> u64 {
    if rate <= 0.0 {
        // Idle slice: push any pending arrival past it.
        let pending = next_arrival.unwrap_or(slice_end);
        *next_arrival = Some(pending.max(slice_end));
        return 0;
    }
    let Ok(gaps) = Exp::new(rate) else {
        return 0;
    };

    let mut arrival = next_arrival
        .unwrap_or_else(|| slice_start + Duration::from_secs_f64(rng.sample(gaps)));
    let mut starts = 0;
    while arrival < slice_end {
        starts += 1;
        let gap: f64 = rng.sample(gaps);
        arrival += Duration::from_secs_f64(gap.max(1e-9));
    }
    *next_arrival = Some(arrival);
    starts
}

/// Per-trace walking state shared with the worker task.
struct Walker {
    topology: Arc<Topology>,
    tracers: Arc<BTreeMap<String, Arc<dyn Tracer>>>,
    observer: Option<Arc<dyn SpanObserver>>,
    overrides: Arc<BTreeMap<String, Override>>,
    cancel: CancellationToken,
    recorder: Arc<StatsRecorder>,
    max_spans: u64,
    parallel_jitter: Duration,
}

impl Walker {
    fn run(&self, root: &OpRef, trace_seed: u64) {
        let mut rng = ChaCha8Rng::seed_from_u64(trace_seed);
        let mut span_count = 0_u64;
        self.walk(
            root,
            SystemTime::now(),
            0,
            None,
            &mut rng,
            &mut span_count,
        );
    }

    /// Walks one operation and its subtree; returns the subtree's total
    /// elapsed time so the caller can place sibling and parent end times.
    fn walk(
        &self,
        op_ref: &OpRef,
        start: SystemTime,
        depth: u32,
        parent: Option<SpanContext>,
        rng: &mut ChaCha8Rng,
        span_count: &mut u64,
    ) -> Duration {
        if *span_count >= self.max_spans {
            return Duration::ZERO;
        }
        let Some(operation) = self.topology.operation(op_ref) else {
            // Unreachable after a successful build; counted, never fatal.
            warn!(%op_ref, "walker reached unresolved operation");
            return Duration::ZERO;
        };

        let key = op_ref.to_string();
        let patch = self.overrides.get(&key);
        let distribution = patch
            .and_then(|p| p.duration)
            .unwrap_or(operation.duration);
        let own_duration = distribution.sample(rng);
        let error_rate = patch
            .and_then(|p| p.error_rate)
            .unwrap_or(operation.error_rate);
        let is_error = rng.gen::<f64>() < error_rate;

        let kind = if depth == 0 || !operation.calls.is_empty() {
            SpanKind::Server
        } else {
            SpanKind::Internal
        };

        let Some(tracer) = self.tracers.get(&operation.service) else {
            return Duration::ZERO;
        };
        let mut span = tracer.start_span(&operation.name, kind, start, parent);
        *span_count += 1;
        self.recorder.record_span();
        if depth == 0 {
            self.recorder.record_trace();
        }
        if is_error {
            self.recorder.record_error();
        }

        if let Some(service) = self.topology.services.get(&operation.service) {
            for (attr_key, attr_value) in &service.attributes {
                span.set_attribute(attr_key, AttributeValue::from(attr_value.as_str()));
            }
        }
        span.set_attribute(
            "service.name",
            AttributeValue::from(operation.service.as_str()),
        );
        for (attr_key, generator) in &operation.attributes {
            span.set_attribute(attr_key, generator.generate(rng));
        }
        if is_error {
            span.set_status(SpanStatus::Error);
            span.set_attribute("error", AttributeValue::Bool(true));
        }

        let context = span.context();
        let mut sequential_elapsed = Duration::ZERO;
        let mut parallel_longest = Duration::ZERO;
        let mut parallel_index: u32 = 0;

        for call in &operation.calls {
            if self.cancel.is_cancelled() {
                break;
            }
            if call.probability < 1.0 && rng.gen::<f64>() >= call.probability {
                continue;
            }
            for _ in 0..call.count {
                if *span_count >= self.max_spans {
                    break;
                }
                let offset = match operation.call_style {
                    CallStyle::Sequential => sequential_elapsed,
                    CallStyle::Parallel => self.parallel_jitter * parallel_index,
                };
                let child_start = start + offset;

                let mut client = tracer.start_span(
                    &call.target.to_string(),
                    SpanKind::Client,
                    child_start,
                    Some(context),
                );
                self.recorder.record_span();

                let subtree = self.walk(
                    &call.target,
                    child_start,
                    depth + 1,
                    Some(client.context()),
                    rng,
                    span_count,
                );
                client.set_attribute(
                    "peer.service",
                    AttributeValue::from(call.target.service.as_str()),
                );
                client.end(child_start + subtree);

                match operation.call_style {
                    CallStyle::Sequential => sequential_elapsed += subtree,
                    CallStyle::Parallel => {
                        parallel_longest = parallel_longest.max(offset + subtree);
                        parallel_index += 1;
                    }
                }
            }
        }

        // Sequential children advance the timeline; parallel children all
        // overlap and the parent tail work runs after the slowest one.
        let total = match operation.call_style {
            CallStyle::Sequential => sequential_elapsed + own_duration,
            CallStyle::Parallel => parallel_longest + own_duration,
        };
        span.end(start + total);

        if let Some(observer) = &self.observer {
            observer.observe(&SpanInfo {
                service: operation.service.clone(),
                operation: operation.name.clone(),
                duration: total,
                is_error,
                kind,
            });
        }

        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::InMemoryMeterProvider;
    use crate::observer::MetricObserver;
    use crate::tracer::{FinishedSpan, InMemoryTracerProvider};
    use std::collections::BTreeMap as Map;
    use synth_model::Config;
    use synth_topology::build_scenarios;

    const CHAIN: &str = r#"
version: 1
services:
  gateway:
    operations:
      "GET /users":
        duration: "30ms +/- 10ms"
        calls:
          - backend.list
  backend:
    operations:
      list:
        duration: "20ms +/- 5ms"
traffic:
  rate: "100/s"
"#;

    fn chain_engine(
        yaml: &str,
        config: EngineConfig,
        observer: Option<Arc<dyn SpanObserver>>,
    ) -> (Engine, InMemoryTracerProvider) {
        let document = Config::from_yaml(yaml).unwrap();
        document.validate().unwrap();
        let topology = Topology::build(&document, None).unwrap();
        let pattern = TrafficPattern::from_config(&document.traffic).unwrap();
        let scenarios = build_scenarios(&document.scenarios).unwrap();
        let tracers = InMemoryTracerProvider::new();
        let engine = Engine::new(
            topology,
            pattern,
            scenarios,
            Arc::new(tracers.clone()),
            observer,
            config,
        );
        (engine, tracers)
    }

    fn spans_by_trace(spans: Vec<FinishedSpan>) -> Map<u64, Vec<FinishedSpan>> {
        let mut traces: Map<u64, Vec<FinishedSpan>> = Map::new();
        for span in spans {
            traces.entry(span.trace_id).or_default().push(span);
        }
        traces
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn chain_produces_expected_trace_shape() {
        let config = EngineConfig::default()
            .with_duration(Duration::from_secs(1))
            .with_seed(42);
        let (engine, tracers) = chain_engine(CHAIN, config, None);

        let stats = engine.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.traces, 100);
        // Root server span + client wrapper + child span per trace.
        assert_eq!(stats.spans, 300);
        assert_eq!(stats.errors, 0);
        assert!(stats.spans_per_sec > 0.0);

        let traces = spans_by_trace(tracers.finished_spans());
        assert_eq!(traces.len(), 100);
        for spans in traces.values() {
            assert_eq!(spans.len(), 3);
            assert!(spans.iter().all(|span| !span.is_error()));

            let root = spans.iter().find(|span| span.is_root()).unwrap();
            assert_eq!(root.kind, SpanKind::Server);
            assert_eq!(root.name, "GET /users");
            assert_eq!(
                root.attributes["service.name"],
                AttributeValue::from("gateway")
            );

            let client = spans
                .iter()
                .find(|span| span.kind == SpanKind::Client)
                .unwrap();
            assert_eq!(client.name, "backend.list");
            assert_eq!(client.parent_span_id, Some(root.span_id));

            let child = spans
                .iter()
                .find(|span| span.kind == SpanKind::Internal)
                .unwrap();
            assert_eq!(child.name, "list");
            assert_eq!(child.parent_span_id, Some(client.span_id));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn spans_keep_causal_ordering() {
        let config = EngineConfig::default()
            .with_duration(Duration::from_millis(200))
            .with_seed(7);
        let (engine, tracers) = chain_engine(CHAIN, config, None);

        engine.run(CancellationToken::new()).await.unwrap();

        for spans in spans_by_trace(tracers.finished_spans()).values() {
            let root = spans.iter().find(|span| span.is_root()).unwrap();
            let client = spans
                .iter()
                .find(|span| span.kind == SpanKind::Client)
                .unwrap();
            let child = spans
                .iter()
                .find(|span| span.kind == SpanKind::Internal)
                .unwrap();

            assert!(root.start <= client.start);
            assert!(client.start <= child.start);
            assert!(child.end <= client.end);
            assert!(client.end <= root.end);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn error_rate_lands_in_expected_band() {
        let yaml = r#"
version: 1
services:
  gateway:
    operations:
      "GET /users":
        duration: "1ms"
        error_rate: "10%"
        calls:
          - backend.list
  backend:
    operations:
      list:
        duration: "1ms"
traffic:
  rate: "10000/s"
"#;
        let config = EngineConfig::default()
            .with_duration(Duration::from_secs(1))
            .with_seed(42);
        let (engine, _tracers) = chain_engine(yaml, config, None);

        let stats = engine.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.traces, 10_000);
        assert!(
            (900..=1100).contains(&stats.errors),
            "errors = {}",
            stats.errors
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scenario_window_flips_errors_on_and_off() {
        let yaml = r#"
version: 1
services:
  svc:
    operations:
      op:
        duration: "1ms"
traffic:
  rate: "50/s"
scenarios:
  - name: outage
    at: "+1s"
    duration: "1s"
    override:
      "svc.op":
        error_rate: "100%"
"#;
        let config = EngineConfig::default()
            .with_duration(Duration::from_secs(3))
            .with_seed(42);
        let (engine, tracers) = chain_engine(yaml, config, None);

        let stats = engine.run(CancellationToken::new()).await.unwrap();

        assert_eq!(stats.traces, 150);
        // Exactly the traces scheduled inside [1s, 2s) error.
        assert_eq!(stats.errors, 50, "errors = {}", stats.errors);

        let error_spans = tracers
            .finished_spans()
            .into_iter()
            .filter(|span| span.is_error())
            .count();
        assert_eq!(error_spans, 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn span_budget_prunes_children() {
        let config = EngineConfig::default()
            .with_duration(Duration::from_millis(200))
            .with_seed(42)
            .with_max_spans_per_trace(1);
        let (engine, tracers) = chain_engine(CHAIN, config, None);

        let stats = engine.run(CancellationToken::new()).await.unwrap();

        // Only the root survives the budget.
        assert_eq!(stats.spans, stats.traces);
        assert!(tracers
            .finished_spans()
            .iter()
            .all(|span| span.name == "GET /users"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancellation_stops_new_traces() {
        let config = EngineConfig::default()
            .with_duration(Duration::from_secs(60))
            .with_seed(42);
        let (engine, _tracers) = chain_engine(CHAIN, config, None);
        let engine = Arc::new(engine);

        let cancel = CancellationToken::new();
        let handle = {
            let engine = Arc::clone(&engine);
            let cancel = cancel.clone();
            tokio::spawn(async move { engine.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        let stats = handle.await.unwrap().unwrap();

        assert!(stats.traces > 0);
        assert!(stats.traces < 100, "traces = {}", stats.traces);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_seed_reproduces_the_run() {
        let run = || async {
            let config = EngineConfig::default()
                .with_duration(Duration::from_millis(500))
                .with_seed(1234);
            let (engine, tracers) = chain_engine(CHAIN, config, None);
            let stats = engine.run(CancellationToken::new()).await.unwrap();
            let mut shape: Vec<(String, bool)> = tracers
                .finished_spans()
                .into_iter()
                .map(|span| (span.name, span.status.is_error()))
                .collect();
            shape.sort();
            (stats.spans, stats.traces, stats.errors, shape)
        };

        let first = run().await;
        let second = run().await;

        assert_eq!(first, second);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn metric_observer_counts_operation_spans() {
        let meters = InMemoryMeterProvider::new();
        let observer: Arc<dyn SpanObserver> = Arc::new(MetricObserver::new(&meters));
        let config = EngineConfig::default()
            .with_duration(Duration::from_secs(1))
            .with_seed(42);
        let (engine, _tracers) = chain_engine(CHAIN, config, Some(observer));

        let stats = engine.run(CancellationToken::new()).await.unwrap();
        assert_eq!(stats.traces, 100);

        // Two operation spans per trace; client wrappers are not observed.
        assert_eq!(meters.counter_total("synth.request.count"), 200);
        assert_eq!(meters.histogram_count("synth.request.duration"), 200);
        assert_eq!(meters.counter_total("synth.error.count"), 0);
        assert_eq!(
            meters.counter_value(
                "synth.request.count",
                &[("operation.name", "list"), ("service.name", "backend")],
            ),
            100
        );
    }

    #[tokio::test]
    async fn empty_topology_is_a_startup_fault() {
        let yaml = r#"
version: 1
traffic:
  rate: "1/s"
"#;
        let (engine, _tracers) = chain_engine(yaml, EngineConfig::default(), None);
        let result = engine.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::NoRoots)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequential_children_advance_timestamps() {
        let yaml = r#"
version: 1
services:
  front:
    operations:
      entry:
        duration: "5ms"
        call_style: sequential
        calls:
          - back.first
          - back.second
  back:
    operations:
      first:
        duration: "10ms"
      second:
        duration: "10ms"
traffic:
  rate: "10/s"
"#;
        let config = EngineConfig::default()
            .with_duration(Duration::from_millis(300))
            .with_seed(5);
        let (engine, tracers) = chain_engine(yaml, config, None);

        engine.run(CancellationToken::new()).await.unwrap();

        for spans in spans_by_trace(tracers.finished_spans()).values() {
            let first = spans.iter().find(|span| span.name == "first").unwrap();
            let second = spans.iter().find(|span| span.name == "second").unwrap();
            let root = spans.iter().find(|span| span.is_root()).unwrap();

            // The second sibling starts when the first subtree ends.
            assert_eq!(second.start, first.end);
            assert!(root.end >= second.end);
        }
    }

    #[test]
    fn carry_accumulator_avoids_truncation_drift() {
        let mut carry = 0.0;
        let mut total = 0;
        for _ in 0..300 {
            total += accumulate_starts(50.0, 0.01, &mut carry);
        }
        assert_eq!(total, 150);
    }

    #[test]
    fn poisson_starts_follow_the_rate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut next_arrival = None;
        let tick = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        let mut total = 0;

        for _ in 0..1000 {
            let slice_end = elapsed + tick;
            total += poisson_starts(&mut rng, 100.0, elapsed, slice_end, &mut next_arrival);
            elapsed = slice_end;
        }

        // 10 simulated seconds at 100/s: roughly 1000 arrivals.
        assert!((800..=1200).contains(&total), "total = {total}");
    }

    #[test]
    fn poisson_idle_slices_emit_nothing() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let mut next_arrival = None;
        let starts = poisson_starts(
            &mut rng,
            0.0,
            Duration::ZERO,
            Duration::from_millis(10),
            &mut next_arrival,
        );
        assert_eq!(starts, 0);
        assert_eq!(next_arrival, Some(Duration::from_millis(10)));
    }
}
