//! Time-windowed scenario overlays.
//!
//! A scenario overrides operation behavior while elapsed simulated time is
//! inside its `[start, end)` window. Windows may overlap; overrides merge
//! field by field with the latest-declared scenario winning, and only
//! explicitly set fields participate.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::time::Duration;
use synth_model::{
    parse_distribution, parse_duration, parse_offset, Distribution, ErrorRateSpec, ScenarioConfig,
};

/// Per-operation behavioral override; `None` fields leave the operation's
/// own value in effect.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Override {
    /// Replacement latency distribution.
    pub duration: Option<Distribution>,
    /// Replacement error rate.
    pub error_rate: Option<f64>,
}

/// A resolved scenario with an absolute simulated-time window.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name, used in logs.
    pub name: String,
    /// Window start (inclusive).
    pub start: Duration,
    /// Window end (exclusive).
    pub end: Duration,
    /// Overrides keyed by `"svc.op"`.
    pub overrides: BTreeMap<String, Override>,
}

impl Scenario {
    /// True while `elapsed` lies inside `[start, end)`.
    #[must_use]
    pub fn is_active(&self, elapsed: Duration) -> bool {
        elapsed >= self.start && elapsed < self.end
    }
}

/// Resolves scenario configs into absolute windows and parsed overrides.
///
/// # Errors
///
/// Returns an error when an offset, duration, distribution or error rate
/// fails to parse.
pub fn build_scenarios(configs: &[ScenarioConfig]) -> Result<Vec<Scenario>> {
    configs
        .iter()
        .map(|config| {
            let start = parse_offset(&config.at)
                .map_err(|e| Error::Build(format!("scenario '{}': {e}", config.name)))?;
            let end = start
                + parse_duration(&config.duration)
                    .map_err(|e| Error::Build(format!("scenario '{}': {e}", config.name)))?;

            let mut overrides = BTreeMap::new();
            for (target, patch) in &config.overrides {
                let duration = patch
                    .duration
                    .as_deref()
                    .map(parse_distribution)
                    .transpose()?;
                let error_rate = patch
                    .error_rate
                    .as_ref()
                    .map(ErrorRateSpec::resolve)
                    .transpose()?;
                overrides.insert(
                    target.clone(),
                    Override {
                        duration,
                        error_rate,
                    },
                );
            }

            Ok(Scenario {
                name: config.name.clone(),
                start,
                end,
                overrides,
            })
        })
        .collect()
}

/// Returns the scenarios whose window contains `elapsed`, in declaration
/// order.
#[must_use]
pub fn active_scenarios(scenarios: &[Scenario], elapsed: Duration) -> Vec<&Scenario> {
    scenarios
        .iter()
        .filter(|scenario| scenario.is_active(elapsed))
        .collect()
}

/// Merges active scenarios into effective per-operation overrides.
///
/// Iterates scenarios in order; each explicitly set field replaces any
/// earlier value, so the latest-declared scenario wins per field.
#[must_use]
pub fn resolve_overrides(active: &[&Scenario]) -> BTreeMap<String, Override> {
    let mut resolved: BTreeMap<String, Override> = BTreeMap::new();
    for scenario in active {
        for (target, patch) in &scenario.overrides {
            let entry = resolved.entry(target.clone()).or_default();
            if patch.duration.is_some() {
                entry.duration = patch.duration;
            }
            if patch.error_rate.is_some() {
                entry.error_rate = patch.error_rate;
            }
        }
    }
    resolved
}
