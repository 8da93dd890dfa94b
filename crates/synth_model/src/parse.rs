//! Scalar grammar parsers: rates, duration literals, distributions,
//! error rates and scenario offsets.

use crate::error::{Error, Result};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest count accepted on the left side of a rate string.
const MAX_RATE_COUNT: i64 = 10_000;

/// Smallest duration a [`Distribution`] will ever sample.
const MIN_SAMPLE: Duration = Duration::from_micros(1);

/// Recognized duration unit suffixes and their length in seconds.
///
/// Order matters: compound suffixes are matched before the bare `s`.
const UNITS: &[(&str, f64)] = &[
    ("ns", 1e-9),
    ("us", 1e-6),
    ("µs", 1e-6),
    ("ms", 1e-3),
    ("s", 1.0),
    ("m", 60.0),
    ("h", 3600.0),
];

/// A traffic rate: `count` trace starts per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// Number of trace starts per period.
    pub count: u32,
    /// The period the count applies to.
    pub period: Duration,
}

impl Rate {
    /// Returns the instantaneous base rate in traces per second.
    #[must_use]
    pub fn per_second(&self) -> f64 {
        f64::from(self.count) / self.period.as_secs_f64()
    }
}

/// Parses a rate string of the form `N/unit`, e.g. `"100/s"` or `"50/min"`.
///
/// Units are case-insensitive; `s`, `sec`, `second(s)`, `m`, `min`,
/// `minute(s)`, `h`, `hour(s)` are accepted. The count must lie in
/// `1..=10000`.
///
/// # Errors
///
/// Returns an error on empty input, a missing `/`, a non-positive or
/// too-large count, or an unknown unit.
pub fn parse_rate(input: &str) -> Result<Rate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(rate_error(input, "empty rate"));
    }

    let (count_str, unit_str) = trimmed
        .split_once('/')
        .ok_or_else(|| rate_error(input, "expected 'count/unit'"))?;

    let count: i64 = count_str
        .trim()
        .parse()
        .map_err(|_| rate_error(input, format!("invalid count '{}'", count_str.trim())))?;
    if count <= 0 {
        return Err(rate_error(input, "count must be positive"));
    }
    if count > MAX_RATE_COUNT {
        return Err(rate_error(
            input,
            format!("count must be at most {MAX_RATE_COUNT}"),
        ));
    }

    let period = match unit_str.trim().to_ascii_lowercase().as_str() {
        "s" | "sec" | "second" | "seconds" => Duration::from_secs(1),
        "m" | "min" | "minute" | "minutes" => Duration::from_secs(60),
        "h" | "hour" | "hours" => Duration::from_secs(3600),
        other => return Err(rate_error(input, format!("unknown unit '{other}'"))),
    };

    let count = u32::try_from(count).map_err(|_| rate_error(input, "count out of range"))?;
    Ok(Rate { count, period })
}

fn rate_error(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRate {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parses a duration literal such as `"250ms"`, `"1.5s"`, `"100us"` or
/// `"2h"`.
///
/// Supported suffixes: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. Fractional
/// values are accepted; negative values are not.
///
/// # Errors
///
/// Returns an error on empty input, a missing or unknown unit suffix, or
/// a value that is not a finite non-negative number.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(duration_error(input, "empty duration"));
    }

    for (suffix, secs_per_unit) in UNITS {
        let Some(value_str) = trimmed.strip_suffix(suffix) else {
            continue;
        };
        let value: f64 = value_str
            .trim()
            .parse()
            .map_err(|_| duration_error(input, format!("invalid value '{}'", value_str.trim())))?;
        if !value.is_finite() || value < 0.0 {
            return Err(duration_error(input, "value must be a non-negative number"));
        }
        return Ok(Duration::from_secs_f64(value * secs_per_unit));
    }

    Err(duration_error(input, "missing or unknown unit suffix"))
}

fn duration_error(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidDuration {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// A latency distribution sampled as `mean + stddev * N(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    /// Mean duration.
    pub mean: Duration,
    /// Standard deviation.
    pub stddev: Duration,
}

impl Distribution {
    /// Creates a distribution from mean and standard deviation.
    #[must_use]
    pub const fn new(mean: Duration, stddev: Duration) -> Self {
        Self { mean, stddev }
    }

    /// Draws one sample, clamped below at 1µs so durations stay positive.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let noise: f64 = rng.sample(StandardNormal);
        let secs = self
            .stddev
            .as_secs_f64()
            .mul_add(noise, self.mean.as_secs_f64());
        if secs <= MIN_SAMPLE.as_secs_f64() {
            MIN_SAMPLE
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Parses a distribution string: `"mean"` or `"mean +/- stddev"`, each side
/// a duration literal, e.g. `"100ms +/- 25ms"`.
///
/// The mean must be strictly positive; an absent stddev means zero.
///
/// # Errors
///
/// Returns an error when either side fails duration parsing or the mean is
/// not positive.
pub fn parse_distribution(input: &str) -> Result<Distribution> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidDistribution {
            input: input.to_string(),
            reason: "empty distribution".to_string(),
        });
    }

    let (mean, stddev) = match trimmed.split_once("+/-") {
        Some((mean_str, stddev_str)) => (parse_duration(mean_str)?, parse_duration(stddev_str)?),
        None => (parse_duration(trimmed)?, Duration::ZERO),
    };

    if mean.is_zero() {
        return Err(Error::InvalidDistribution {
            input: input.to_string(),
            reason: "mean must be positive".to_string(),
        });
    }

    Ok(Distribution { mean, stddev })
}

/// Parses an error rate: either a percentage (`"2.5%"`, 0–100) or a bare
/// fraction (`"0.025"`, 0–1).
///
/// # Errors
///
/// Returns an error for malformed numbers or values outside the allowed
/// range.
pub fn parse_error_rate(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(error_rate_error(input, "empty error rate"));
    }

    if let Some(pct_str) = trimmed.strip_suffix('%') {
        let pct: f64 = pct_str
            .trim()
            .parse()
            .map_err(|_| error_rate_error(input, "invalid percentage"))?;
        if !(0.0..=100.0).contains(&pct) {
            return Err(error_rate_error(input, "percentage must be in [0, 100]"));
        }
        return Ok(pct / 100.0);
    }

    let value: f64 = trimmed
        .parse()
        .map_err(|_| error_rate_error(input, "invalid number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(error_rate_error(input, "fraction must be in [0, 1]"));
    }
    Ok(value)
}

fn error_rate_error(input: &str, reason: impl Into<String>) -> Error {
    Error::InvalidErrorRate {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Parses a scenario offset: an optional leading `+` followed by a duration
/// literal, e.g. `"+2m"` or `"30s"`.
///
/// # Errors
///
/// Returns an error when the remainder is not a valid duration literal.
pub fn parse_offset(input: &str) -> Result<Duration> {
    let trimmed = input.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    parse_duration(body)
}
