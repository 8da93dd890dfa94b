//! Traffic pattern model.
//!
//! A pattern maps elapsed simulated time to an instantaneous trace-start
//! rate in traces per second. Patterns only shape the curve; arrival
//! realization (including Poisson inter-arrival sampling) happens in the
//! engine.

use crate::error::{Error, Result};
use serde::Serialize;
use std::f64::consts::TAU;
use std::time::Duration;
use synth_model::{parse_duration, parse_rate, TrafficConfig};

const DIURNAL_PEAK: f64 = 1.5;
const DIURNAL_TROUGH: f64 = 0.5;
const DIURNAL_PERIOD: Duration = Duration::from_secs(24 * 3600);

const BURST_MULTIPLIER: f64 = 5.0;
const BURST_INTERVAL: Duration = Duration::from_secs(5 * 60);
const BURST_DURATION: Duration = Duration::from_secs(30);

/// One segment of a custom pattern: `rate` applies while elapsed < `until`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Segment {
    /// Upper (exclusive) time boundary of the segment.
    pub until: Duration,
    /// Rate within the segment, traces per second.
    pub rate: f64,
}

/// A traffic rate curve over elapsed simulated time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPattern {
    /// Constant rate.
    Uniform {
        /// Base rate in traces per second.
        base: f64,
    },
    /// Sinusoidal day/night cycle, peaking at half the period.
    Diurnal {
        /// Base rate in traces per second.
        base: f64,
        /// Multiplier at the peak of the cycle.
        peak: f64,
        /// Multiplier at the trough of the cycle.
        trough: f64,
        /// Cycle period in hours.
        period_hours: f64,
    },
    /// Constant mean rate; the engine samples stochastic inter-arrivals.
    Poisson {
        /// Mean rate in traces per second.
        base: f64,
    },
    /// Periodic bursts of elevated traffic.
    Bursty {
        /// Base rate in traces per second.
        base: f64,
        /// Rate multiplier while inside a burst window.
        multiplier: f64,
        /// Interval between burst starts.
        interval: Duration,
        /// Length of each burst; must be shorter than the interval.
        duration: Duration,
    },
    /// Piecewise rates with an ordered list of boundaries.
    Custom {
        /// Fallback rate once every segment boundary has passed.
        base: f64,
        /// Segments in ascending `until` order.
        segments: Vec<Segment>,
    },
    /// Composite: base curve scaled by a normalized overlay curve.
    Overlay {
        /// The underlying pattern.
        base: Box<TrafficPattern>,
        /// The modulating pattern.
        overlay: Box<TrafficPattern>,
        /// The overlay's own base rate used for normalization.
        overlay_base: f64,
    },
}

impl TrafficPattern {
    /// Builds a pattern from a traffic config section, applying defaults
    /// and enforcing pattern invariants.
    ///
    /// # Errors
    ///
    /// Returns an error for unparseable scalars, unknown pattern names,
    /// `burst_duration >= burst_interval`, a peak below the trough,
    /// negative multipliers, or duplicate custom segment boundaries.
    pub fn from_config(config: &TrafficConfig) -> Result<Self> {
        let base = parse_rate(&config.rate)?.per_second();

        let mut pattern = match config.pattern.as_deref().unwrap_or("uniform") {
            "uniform" => Self::Uniform { base },
            "poisson" => Self::Poisson { base },
            "diurnal" => Self::diurnal_from_config(config, base)?,
            "bursty" => Self::bursty_from_config(config, base)?,
            "custom" => Self::custom_from_config(config, base)?,
            other => {
                return Err(Error::InvalidPattern(format!("unknown pattern '{other}'")));
            }
        };

        if let Some(overlay_config) = &config.overlay {
            let overlay_base = parse_rate(&overlay_config.rate)?.per_second();
            let overlay = Self::from_config(overlay_config)?;
            pattern = Self::Overlay {
                base: Box::new(pattern),
                overlay: Box::new(overlay),
                overlay_base,
            };
        }

        Ok(pattern)
    }

    fn diurnal_from_config(config: &TrafficConfig, base: f64) -> Result<Self> {
        let peak = config.peak_multiplier.unwrap_or(DIURNAL_PEAK);
        let trough = config.trough_multiplier.unwrap_or(DIURNAL_TROUGH);
        if trough < 0.0 {
            return Err(Error::InvalidPattern(
                "trough_multiplier must be non-negative".to_string(),
            ));
        }
        if peak < trough {
            return Err(Error::InvalidPattern(
                "peak_multiplier must be at least trough_multiplier".to_string(),
            ));
        }
        let period = match &config.period {
            Some(period) => parse_duration(period)?,
            None => DIURNAL_PERIOD,
        };
        if period.is_zero() {
            return Err(Error::InvalidPattern("period must be positive".to_string()));
        }
        Ok(Self::Diurnal {
            base,
            peak,
            trough,
            period_hours: period.as_secs_f64() / 3600.0,
        })
    }

    fn bursty_from_config(config: &TrafficConfig, base: f64) -> Result<Self> {
        let multiplier = config.burst_multiplier.unwrap_or(BURST_MULTIPLIER);
        if multiplier < 0.0 {
            return Err(Error::InvalidPattern(
                "burst_multiplier must be non-negative".to_string(),
            ));
        }
        let interval = match &config.burst_interval {
            Some(interval) => parse_duration(interval)?,
            None => BURST_INTERVAL,
        };
        let duration = match &config.burst_duration {
            Some(duration) => parse_duration(duration)?,
            None => BURST_DURATION,
        };
        if interval.is_zero() {
            return Err(Error::InvalidPattern(
                "burst_interval must be positive".to_string(),
            ));
        }
        if duration >= interval {
            return Err(Error::InvalidPattern(
                "burst_duration must be shorter than burst_interval".to_string(),
            ));
        }
        Ok(Self::Bursty {
            base,
            multiplier,
            interval,
            duration,
        })
    }

    fn custom_from_config(config: &TrafficConfig, base: f64) -> Result<Self> {
        let mut segments = Vec::with_capacity(config.segments.len());
        for segment in &config.segments {
            segments.push(Segment {
                until: parse_duration(&segment.until)?,
                rate: parse_rate(&segment.rate)?.per_second(),
            });
        }
        segments.sort_by_key(|segment| segment.until);
        if segments.windows(2).any(|pair| pair[0].until == pair[1].until) {
            return Err(Error::InvalidPattern(
                "custom segments must have distinct 'until' boundaries".to_string(),
            ));
        }
        Ok(Self::Custom { base, segments })
    }

    /// Returns the instantaneous rate in traces per second at `elapsed`.
    ///
    /// Never returns a negative value.
    #[must_use]
    pub fn rate(&self, elapsed: Duration) -> f64 {
        let rate = match self {
            Self::Uniform { base } | Self::Poisson { base } => *base,
            Self::Diurnal {
                base,
                peak,
                trough,
                period_hours,
            } => {
                let mid = (peak + trough) / 2.0;
                let amp = (peak - trough) / 2.0;
                let hours = elapsed.as_secs_f64() / 3600.0;
                let phase = TAU * (hours - period_hours / 4.0) / period_hours;
                base * amp.mul_add(phase.sin(), mid)
            }
            Self::Bursty {
                base,
                multiplier,
                interval,
                duration,
            } => {
                let position = elapsed.as_secs_f64() % interval.as_secs_f64();
                if position < duration.as_secs_f64() {
                    base * multiplier
                } else {
                    *base
                }
            }
            Self::Custom { base, segments } => segments
                .iter()
                .find(|segment| elapsed < segment.until)
                .map_or(*base, |segment| segment.rate),
            Self::Overlay {
                base,
                overlay,
                overlay_base,
            } => {
                if overlay_base.abs() < f64::EPSILON {
                    base.rate(elapsed)
                } else {
                    base.rate(elapsed) * overlay.rate(elapsed) / overlay_base
                }
            }
        };
        rate.max(0.0)
    }

    /// Returns the configured base rate (the overlay's underlying base).
    #[must_use]
    pub fn base_rate(&self) -> f64 {
        match self {
            Self::Uniform { base }
            | Self::Poisson { base }
            | Self::Diurnal { base, .. }
            | Self::Bursty { base, .. }
            | Self::Custom { base, .. } => *base,
            Self::Overlay { base, .. } => base.base_rate(),
        }
    }

    /// True when arrivals should be realized with stochastic
    /// inter-arrival sampling rather than a fractional accumulator.
    #[must_use]
    pub fn is_poisson(&self) -> bool {
        match self {
            Self::Poisson { .. } => true,
            Self::Overlay { base, .. } => base.is_poisson(),
            _ => false,
        }
    }
}
