//! Run command implementation.

use crate::commands::CliError;
use crate::loader;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use synth_engine::{
    Engine, EngineConfig, InMemoryMeterProvider, LogTracerProvider, MetricObserver, SpanObserver,
};
use synth_model::parse_duration;
use synth_topology::{build_scenarios, Topology};
use synth_traffic::TrafficPattern;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// Runs the run command.
pub async fn run(
    config_source: &str,
    duration: Option<&str>,
    seed: u64,
    rate: Option<&str>,
    max_spans_per_trace: u64,
    workers: Option<usize>,
) -> Result<(), CliError> {
    let (engine, meters) = prepare(
        config_source,
        duration,
        seed,
        rate,
        max_spans_per_trace,
        workers,
    )
    .await
    .map_err(CliError::Config)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, draining in-flight traces");
                cancel.cancel();
            }
        });
    }

    let stats = engine
        .run(cancel)
        .await
        .map_err(|e| CliError::Runtime(e.into()))?;

    info!("Run complete");
    info!("  traces:    {}", stats.traces);
    info!("  spans:     {}", stats.spans);
    info!("  errors:    {}", stats.errors);
    info!("  spans/sec: {:.1}", stats.spans_per_sec);
    info!("  wall time: {:.2?}", stats.duration);
    info!(
        "  requests:  {} observed, {} errored",
        meters.counter_total("synth.request.count"),
        meters.counter_total("synth.error.count")
    );
    Ok(())
}

async fn prepare(
    config_source: &str,
    duration: Option<&str>,
    seed: u64,
    rate: Option<&str>,
    max_spans_per_trace: u64,
    workers: Option<usize>,
) -> Result<(Engine, InMemoryMeterProvider)> {
    let mut config = loader::load(config_source).await?;
    if let Some(rate) = rate {
        config.traffic.rate = rate.to_string();
    }
    config.validate().context("config validation failed")?;

    let duration = match duration {
        Some(text) => parse_duration(text).context("invalid --duration")?,
        None => DEFAULT_DURATION,
    };

    let topology = Topology::build(&config, None).context("topology build failed")?;
    let pattern =
        TrafficPattern::from_config(&config.traffic).context("traffic pattern build failed")?;
    let scenarios = build_scenarios(&config.scenarios).context("scenario build failed")?;

    info!(
        "Starting run: {} services, {} operations, {} roots, {:?} at seed {seed}",
        topology.services.len(),
        topology.operation_count(),
        topology.roots.len(),
        duration,
    );

    let meters = InMemoryMeterProvider::new();
    let observer: Arc<dyn SpanObserver> = Arc::new(MetricObserver::new(&meters));

    let mut engine_config = EngineConfig::default()
        .with_duration(duration)
        .with_seed(seed)
        .with_max_spans_per_trace(max_spans_per_trace);
    if let Some(workers) = workers {
        engine_config = engine_config.with_workers(workers);
    }

    let engine = Engine::new(
        topology,
        pattern,
        scenarios,
        Arc::new(LogTracerProvider::new()),
        Some(observer),
        engine_config,
    );
    Ok((engine, meters))
}
