//! procwatch - a /proc resource sampler exposing Prometheus gauges
//!
//! Periodically reads kernel counters for CPU, memory, disk, network and
//! process activity, keeps the latest values in a [`GaugeStore`], and serves
//! them over HTTP in the Prometheus text exposition format.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod cpu;
pub mod exposition;
pub mod gauges;
pub mod parsers;
pub mod sampler;
pub mod sources;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
pub use crate::gauges::{Gauge, GaugeStore};
pub use crate::sampler::{CycleReport, GroupOutcome, Sampler, Selectors};
pub use crate::sources::{ProcSource, RealFs, SourceKind};
