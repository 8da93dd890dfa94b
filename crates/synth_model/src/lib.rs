//! Configuration model and scalar parsers for synth.
//!
//! This crate provides:
//! - The declarative YAML document types (services, traffic, scenarios)
//! - Grammar parsers for rates (`"100/s"`), duration literals (`"250ms"`),
//!   latency distributions (`"100ms +/- 25ms"`), error rates (`"2%"`) and
//!   scenario offsets (`"+1m"`)
//! - Structural validation of the whole document
//!
//! # Example
//!
//! ```rust
//! use synth_model::{parse_distribution, parse_rate};
//!
//! let rate = parse_rate("100/s").unwrap();
//! assert!((rate.per_second() - 100.0).abs() < f64::EPSILON);
//!
//! let dist = parse_distribution("100ms +/- 25ms").unwrap();
//! assert_eq!(dist.mean.as_millis(), 100);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod error;
pub mod parse;

pub use config::{
    AttrSpec, CallConfig, Config, DetailedCall, ErrorRateSpec, NormalSpec, OperationConfig,
    OverrideConfig, ScenarioConfig, SegmentConfig, ServiceConfig, TrafficConfig,
};
pub use error::{Error, Result};
pub use parse::{
    parse_distribution, parse_duration, parse_error_rate, parse_offset, parse_rate, Distribution,
    Rate,
};
