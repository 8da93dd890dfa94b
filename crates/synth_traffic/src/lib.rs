//! Traffic pattern rate curves for synth.
//!
//! This crate turns the `traffic` config section into a [`TrafficPattern`]
//! that maps elapsed simulated time to an instantaneous trace-start rate.
//!
//! # Example
//!
//! ```rust,ignore
//! use synth_traffic::TrafficPattern;
//!
//! let pattern = TrafficPattern::from_config(&config.traffic)?;
//! let rate = pattern.rate(std::time::Duration::from_secs(30));
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod pattern;

pub use error::{Error, Result};
pub use pattern::{Segment, TrafficPattern};
