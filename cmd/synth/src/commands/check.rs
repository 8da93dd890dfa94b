//! Check command implementation.

use crate::commands::CliError;
use crate::loader;
use anyhow::{Context, Result};
use synth_topology::{build_scenarios, Topology};
use synth_traffic::TrafficPattern;
use tracing::info;

/// Runs the check command.
pub async fn run(config_source: &str) -> Result<(), CliError> {
    inner(config_source).await.map_err(CliError::Config)
}

async fn inner(config_source: &str) -> Result<()> {
    let config = loader::load(config_source).await?;
    config.validate().context("config validation failed")?;

    let topology = Topology::build(&config, None).context("topology build failed")?;
    let pattern =
        TrafficPattern::from_config(&config.traffic).context("traffic pattern build failed")?;
    let scenarios = build_scenarios(&config.scenarios).context("scenario build failed")?;

    let roots: Vec<String> = topology.roots.iter().map(ToString::to_string).collect();

    info!("Config OK: {config_source}");
    info!("  services:   {}", topology.services.len());
    info!("  operations: {}", topology.operation_count());
    info!("  roots:      {}", roots.join(", "));
    info!("  base rate:  {:.1}/s", pattern.base_rate());
    info!("  scenarios:  {}", scenarios.len());
    Ok(())
}
