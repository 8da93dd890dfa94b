//! Declarative configuration document.
//!
//! These types mirror the YAML surface: a `services` section describing the
//! topology, a `traffic` section shaping trace arrivals, and an optional
//! `scenarios` list of time-windowed overrides. All mappings are `BTreeMap`
//! so iteration order is lexicographic and runs are reproducible.

use crate::error::{Error, Result};
use crate::parse::{parse_distribution, parse_duration, parse_error_rate, parse_offset, parse_rate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only config schema version this build understands.
const SUPPORTED_VERSION: u32 = 1;

/// Traffic pattern names accepted in the `pattern` field.
const PATTERN_NAMES: &[&str] = &["uniform", "diurnal", "poisson", "bursty", "custom"];

/// Top-level configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Config schema version; must be 1.
    pub version: u32,
    /// Services keyed by name.
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
    /// Traffic shaping for trace arrivals.
    pub traffic: TrafficConfig,
    /// Time-windowed behavioral overrides.
    #[serde(default)]
    pub scenarios: Vec<ScenarioConfig>,
}

/// A service and its operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Static attributes stamped on every span of this service.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Operations keyed by name.
    #[serde(default)]
    pub operations: BTreeMap<String, OperationConfig>,
}

/// A single operation within a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationConfig {
    /// Optional domain tag resolved through a domain resolver.
    #[serde(default)]
    pub domain: Option<String>,
    /// Latency distribution, e.g. `"100ms +/- 25ms"`.
    pub duration: String,
    /// Error rate, e.g. `"0.5%"` or `0.005`.
    #[serde(default)]
    pub error_rate: Option<ErrorRateSpec>,
    /// Downstream calls made by this operation, in order.
    #[serde(default)]
    pub calls: Vec<CallConfig>,
    /// `"parallel"` (default) or `"sequential"` child execution.
    #[serde(default)]
    pub call_style: Option<String>,
    /// Per-span attribute generators keyed by attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, AttrSpec>,
}

/// An error rate given either as a string (`"2%"`, `"0.02"`) or a bare
/// YAML number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorRateSpec {
    /// String form, parsed by [`parse_error_rate`].
    Text(String),
    /// Numeric fraction in `[0, 1]`.
    Number(f64),
}

impl ErrorRateSpec {
    /// Resolves the spec to a fraction in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed strings or out-of-range values.
    pub fn resolve(&self) -> Result<f64> {
        match self {
            Self::Text(text) => parse_error_rate(text),
            Self::Number(value) => {
                if (0.0..=1.0).contains(value) {
                    Ok(*value)
                } else {
                    Err(Error::InvalidErrorRate {
                        input: value.to_string(),
                        reason: "fraction must be in [0, 1]".to_string(),
                    })
                }
            }
        }
    }
}

/// A downstream call: either shorthand `"svc.op"` or a detailed mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CallConfig {
    /// Shorthand target reference.
    Target(String),
    /// Detailed call with inclusion probability and repetition count.
    Detailed(DetailedCall),
}

/// The mapping form of a downstream call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetailedCall {
    /// Target reference in `"svc.op"` form.
    pub target: String,
    /// Fraction of traces that include this call.
    #[serde(default = "default_probability")]
    pub probability: f64,
    /// Reserved; any non-empty value is rejected at validation.
    #[serde(default)]
    pub condition: String,
    /// Number of repeated child invocations.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_probability() -> f64 {
    1.0
}

const fn default_count() -> u32 {
    1
}

impl CallConfig {
    /// Returns the target reference string.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Target(target) => target,
            Self::Detailed(call) => &call.target,
        }
    }

    /// Returns the inclusion probability (1.0 for shorthand calls).
    #[must_use]
    pub fn probability(&self) -> f64 {
        match self {
            Self::Target(_) => 1.0,
            Self::Detailed(call) => call.probability,
        }
    }

    /// Returns the repetition count (1 for shorthand calls).
    #[must_use]
    pub const fn count(&self) -> u32 {
        match self {
            Self::Target(_) => 1,
            Self::Detailed(call) => call.count,
        }
    }

    fn validate(&self) -> Result<()> {
        let target = self.target();
        match target.split_once('.') {
            Some((service, operation)) if !service.is_empty() && !operation.is_empty() => {}
            _ => {
                return Err(Error::Validation(format!(
                    "call target '{target}' must have the form 'service.operation'"
                )));
            }
        }
        if let Self::Detailed(call) = self {
            if !(0.0..=1.0).contains(&call.probability) {
                return Err(Error::Validation(format!(
                    "call target '{target}': probability must be in [0, 1]"
                )));
            }
            if !call.condition.is_empty() {
                return Err(Error::Validation(format!(
                    "call target '{target}': conditions are not supported"
                )));
            }
            if call.count == 0 {
                return Err(Error::Validation(format!(
                    "call target '{target}': count must be at least 1"
                )));
            }
        }
        Ok(())
    }
}

/// Attribute generator spec; exactly one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttrSpec {
    /// Static value returned unchanged.
    #[serde(default)]
    pub value: Option<serde_yaml::Value>,
    /// Weighted choice over values; weights are positive integers.
    #[serde(default)]
    pub values: Option<BTreeMap<String, i64>>,
    /// Pattern with a `{n}` placeholder fed by a monotonic counter.
    #[serde(default)]
    pub sequence: Option<String>,
    /// Inclusive integer range `[min, max]`.
    #[serde(default)]
    pub range: Option<(i64, i64)>,
    /// Normal float distribution.
    #[serde(default)]
    pub normal: Option<NormalSpec>,
    /// Boolean that is `true` with the given probability.
    #[serde(default)]
    pub probability: Option<f64>,
}

/// Parameters of a normal attribute distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormalSpec {
    /// Mean of the distribution.
    pub mean: f64,
    /// Standard deviation; must be non-negative.
    pub stddev: f64,
}

impl AttrSpec {
    /// Validates that exactly one variant is set and its constraints hold.
    ///
    /// # Errors
    ///
    /// Returns an error when zero or multiple variants are populated, or a
    /// variant violates its constraints.
    pub fn validate(&self) -> Result<()> {
        let populated = usize::from(self.value.is_some())
            + usize::from(self.values.is_some())
            + usize::from(self.sequence.is_some())
            + usize::from(self.range.is_some())
            + usize::from(self.normal.is_some())
            + usize::from(self.probability.is_some());
        if populated != 1 {
            return Err(Error::Validation(format!(
                "attribute spec must set exactly one of value/values/sequence/range/normal/probability, found {populated}"
            )));
        }

        if let Some(values) = &self.values {
            if values.is_empty() {
                return Err(Error::Validation(
                    "weighted choice needs at least one value".to_string(),
                ));
            }
            let mut total: i64 = 0;
            for (value, weight) in values {
                if *weight <= 0 {
                    return Err(Error::Validation(format!(
                        "weighted choice '{value}': weight must be positive"
                    )));
                }
                total = total.checked_add(*weight).ok_or_else(|| {
                    Error::Validation("weighted choice weights overflow i64".to_string())
                })?;
            }
        }
        if let Some((min, max)) = self.range {
            if min > max {
                return Err(Error::Validation(format!(
                    "range [{min}, {max}]: min must not exceed max"
                )));
            }
        }
        if let Some(normal) = self.normal {
            if normal.stddev < 0.0 {
                return Err(Error::Validation(
                    "normal stddev must be non-negative".to_string(),
                ));
            }
        }
        if let Some(probability) = self.probability {
            if !(0.0..=1.0).contains(&probability) {
                return Err(Error::Validation(
                    "probability must be in [0, 1]".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Traffic shaping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficConfig {
    /// Base rate, e.g. `"100/s"`.
    pub rate: String,
    /// Pattern name; defaults to `uniform`.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Recursive overlay multiplied onto this pattern.
    #[serde(default)]
    pub overlay: Option<Box<TrafficConfig>>,
    /// Diurnal peak multiplier (default 1.5).
    #[serde(default)]
    pub peak_multiplier: Option<f64>,
    /// Diurnal trough multiplier (default 0.5).
    #[serde(default)]
    pub trough_multiplier: Option<f64>,
    /// Diurnal period as a duration literal (default `"24h"`).
    #[serde(default)]
    pub period: Option<String>,
    /// Bursty rate multiplier during bursts (default 5).
    #[serde(default)]
    pub burst_multiplier: Option<f64>,
    /// Interval between burst starts (default `"5m"`).
    #[serde(default)]
    pub burst_interval: Option<String>,
    /// Length of each burst (default `"30s"`).
    #[serde(default)]
    pub burst_duration: Option<String>,
    /// Segments for the `custom` pattern.
    #[serde(default)]
    pub segments: Vec<SegmentConfig>,
}

/// One segment of a custom traffic pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentConfig {
    /// Segment applies while elapsed time is below this boundary.
    pub until: String,
    /// Rate within the segment, in `"N/unit"` form.
    pub rate: String,
}

impl TrafficConfig {
    fn validate(&self) -> Result<()> {
        parse_rate(&self.rate)?;
        if let Some(pattern) = &self.pattern {
            if !PATTERN_NAMES.contains(&pattern.as_str()) {
                return Err(Error::Validation(format!(
                    "unknown traffic pattern '{pattern}'"
                )));
            }
        }
        if let Some(period) = &self.period {
            parse_duration(period)?;
        }
        if let Some(interval) = &self.burst_interval {
            parse_duration(interval)?;
        }
        if let Some(duration) = &self.burst_duration {
            parse_duration(duration)?;
        }
        for segment in &self.segments {
            parse_duration(&segment.until)?;
            parse_rate(&segment.rate)?;
        }
        if let Some(overlay) = &self.overlay {
            overlay.validate()?;
        }
        Ok(())
    }
}

/// A time-windowed scenario overriding operation behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Scenario name, used in logs.
    pub name: String,
    /// Window start offset, e.g. `"+2m"`.
    pub at: String,
    /// Window length, e.g. `"30s"`.
    pub duration: String,
    /// Overrides keyed by `"svc.op"`.
    #[serde(rename = "override", default)]
    pub overrides: BTreeMap<String, OverrideConfig>,
}

/// Per-operation override fields; only set fields take effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideConfig {
    /// Replacement latency distribution.
    #[serde(default)]
    pub duration: Option<String>,
    /// Replacement error rate.
    #[serde(default)]
    pub error_rate: Option<ErrorRateSpec>,
}

impl ScenarioConfig {
    fn validate(&self, services: &BTreeMap<String, ServiceConfig>) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("scenario name must not be empty".to_string()));
        }
        parse_offset(&self.at)?;
        parse_duration(&self.duration)?;

        for (target, config) in &self.overrides {
            let resolved = target.split_once('.').and_then(|(service, operation)| {
                services
                    .get(service)
                    .and_then(|svc| svc.operations.get(operation))
            });
            if resolved.is_none() {
                return Err(Error::Validation(format!(
                    "scenario '{}': override target '{target}' does not name an existing operation",
                    self.name
                )));
            }
            if let Some(duration) = &config.duration {
                parse_distribution(duration)?;
            }
            if let Some(error_rate) = &config.error_rate {
                error_rate.resolve()?;
            }
        }
        Ok(())
    }
}

impl Config {
    /// Validates the document structure and every embedded scalar grammar.
    ///
    /// Validation is pure: calling it repeatedly on the same document yields
    /// the same outcome and mutates nothing.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, with service/operation context in
    /// the message.
    pub fn validate(&self) -> Result<()> {
        if self.version != SUPPORTED_VERSION {
            return Err(Error::Validation(format!(
                "unsupported config version {} (expected {SUPPORTED_VERSION})",
                self.version
            )));
        }

        for (service_name, service) in &self.services {
            for (operation_name, operation) in &service.operations {
                operation.validate().map_err(|e| {
                    Error::Validation(format!(
                        "service {service_name} operation {operation_name}: {e}"
                    ))
                })?;
            }
        }

        self.traffic.validate()?;

        for scenario in &self.scenarios {
            scenario.validate(&self.services)?;
        }
        Ok(())
    }

    /// Parses a YAML document into a config without validating it.
    ///
    /// # Errors
    ///
    /// Returns an error when the YAML is malformed or does not match the
    /// document shape.
    pub fn from_yaml(input: &str) -> Result<Self> {
        serde_yaml::from_str(input)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }
}

impl OperationConfig {
    fn validate(&self) -> Result<()> {
        parse_distribution(&self.duration)?;
        if let Some(error_rate) = &self.error_rate {
            error_rate.resolve()?;
        }
        if let Some(style) = &self.call_style {
            if !matches!(style.as_str(), "" | "parallel" | "sequential") {
                return Err(Error::Validation(format!(
                    "call_style must be 'parallel' or 'sequential', found '{style}'"
                )));
            }
        }
        for call in &self.calls {
            call.validate()?;
        }
        for (name, spec) in &self.attributes {
            spec.validate()
                .map_err(|e| Error::Validation(format!("attribute '{name}': {e}")))?;
        }
        Ok(())
    }
}
