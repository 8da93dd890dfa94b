//! Topology graph, attribute generators and scenario overlays for synth.
//!
//! This crate provides:
//! - Typed attribute values and polymorphic per-span value generators
//! - Two-pass topology construction with call resolution, cycle detection
//!   and root discovery
//! - Time-windowed scenario overrides with field-wise merging
//!
//! # Example
//!
//! ```rust,ignore
//! use synth_topology::Topology;
//!
//! let topology = Topology::build(&config, None)?;
//! assert!(!topology.roots.is_empty());
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod error;
pub mod generator;
pub mod scenario;
pub mod topology;

pub use error::{Error, Result};
pub use generator::{AttributeGenerator, AttributeValue};
pub use scenario::{active_scenarios, build_scenarios, resolve_overrides, Override, Scenario};
pub use topology::{Call, CallStyle, DomainResolver, OpRef, Operation, Service, Topology};
