//! Init command implementation.

use crate::commands::CliError;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

const STARTER_CONFIG: &str = r#"version: 1

services:
  gateway:
    attributes:
      region: us-east-1
    operations:
      "GET /users":
        duration: "30ms +/- 10ms"
        error_rate: "0.5%"
        calls:
          - users.list
        attributes:
          http.method:
            value: GET
          request.id:
            sequence: "req-{n}"
  users:
    operations:
      list:
        duration: "20ms +/- 5ms"
        calls:
          - target: cache.get
            probability: 0.8
        attributes:
          db.rows:
            range: [1, 500]
  cache:
    operations:
      get:
        duration: "2ms +/- 1ms"
        attributes:
          cache.hit:
            probability: 0.9

traffic:
  rate: "100/s"
  pattern: uniform

scenarios:
  - name: cache-outage
    at: "+2m"
    duration: "30s"
    override:
      "cache.get":
        duration: "250ms +/- 50ms"
        error_rate: "25%"
"#;

/// Runs the init command.
pub fn run(path: &str) -> Result<(), CliError> {
    inner(path).map_err(CliError::Runtime)
}

fn inner(path: &str) -> Result<()> {
    let target = Path::new(path);

    if target.exists() {
        info!("Skipped: {} (already exists)", target.display());
        return Ok(());
    }

    fs::write(target, STARTER_CONFIG)
        .with_context(|| format!("failed to create {}", target.display()))?;
    info!("Created: {}", target.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit {} to describe your topology", target.display());
    info!("  2. Run 'synth check --config {path}' to validate it");
    info!("  3. Run 'synth run --config {path}' to drive the workload");

    Ok(())
}
