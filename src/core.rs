//! Core domain types and service traits for procwatch
//!
//! This module defines the samples produced by the parsers, the metric groups
//! the sampler publishes, the error taxonomy shared by every collector, and
//! the `FileSystem` seam that source reads go through.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Memory usage derived from `/proc/meminfo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    pub total_kb: u64,
    pub available_kb: u64,
    /// `total_kb - available_kb`
    pub used_kb: u64,
    pub usage_percent: f64,
}

impl MemorySample {
    /// Builds a sample from the two raw counters, rejecting values that would
    /// make the derived fields meaningless.
    pub fn from_counters(total_kb: u64, available_kb: u64) -> Result<Self, ParseFailure> {
        if total_kb == 0 {
            return Err(ParseFailure::ZeroTotal);
        }
        if available_kb > total_kb {
            return Err(ParseFailure::AvailableExceedsTotal {
                total_kb,
                available_kb,
            });
        }

        let used_kb = total_kb - available_kb;
        Ok(Self {
            total_kb,
            available_kb,
            used_kb,
            usage_percent: used_kb as f64 * 100.0 / total_kb as f64,
        })
    }
}

/// The eight cumulative counters of the aggregate `cpu` line in `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSnapshot {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuSnapshot {
    /// Ticks spent idle or waiting on I/O, or `None` if the sum overflows.
    pub fn idle_total(&self) -> Option<u64> {
        self.idle.checked_add(self.iowait)
    }

    /// Ticks spent doing work, or `None` if the sum overflows.
    pub fn non_idle(&self) -> Option<u64> {
        [self.nice, self.system, self.irq, self.softirq, self.steal]
            .into_iter()
            .try_fold(self.user, u64::checked_add)
    }

    pub fn total(&self) -> Option<u64> {
        self.idle_total()?.checked_add(self.non_idle()?)
    }
}

/// Cumulative I/O counters for one block device from `/proc/diskstats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSample {
    pub device: String,
    /// Reads completed successfully.
    pub reads: u64,
    /// Writes completed successfully.
    pub writes: u64,
    /// Milliseconds spent doing I/O.
    pub total_time_ms: u64,
}

/// Cumulative byte counters for one interface from `/proc/net/dev`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSample {
    pub interface: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// Scheduler counters read from one pass over `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessCounters {
    /// Instantaneous number of runnable processes.
    pub running_processes: u64,
    /// Context switches since boot.
    pub context_switches: u64,
}

/// A set of gauges that are sampled from one source and published together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum MetricGroup {
    Cpu,
    Memory,
    Diskstats,
    Network,
    /// Always collected, regardless of the enabled subset.
    #[value(skip)]
    Processes,
}

impl MetricGroup {
    /// Every group in lock order.
    pub const ALL: [MetricGroup; 5] = [
        MetricGroup::Cpu,
        MetricGroup::Memory,
        MetricGroup::Diskstats,
        MetricGroup::Network,
        MetricGroup::Processes,
    ];

    /// The groups an operator may switch off.
    pub const OPTIONAL: [MetricGroup; 4] = [
        MetricGroup::Cpu,
        MetricGroup::Memory,
        MetricGroup::Diskstats,
        MetricGroup::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricGroup::Cpu => "cpu",
            MetricGroup::Memory => "memory",
            MetricGroup::Diskstats => "diskstats",
            MetricGroup::Network => "network",
            MetricGroup::Processes => "processes",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            MetricGroup::Cpu => 0,
            MetricGroup::Memory => 1,
            MetricGroup::Diskstats => 2,
            MetricGroup::Network => 3,
            MetricGroup::Processes => 4,
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a source's text could not be turned into a sample.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("required field `{0}` not found")]
    MissingField(&'static str),

    #[error("field `{field}` is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("total memory is zero")]
    ZeroTotal,

    #[error("available memory ({available_kb} kB) exceeds total ({total_kb} kB)")]
    AvailableExceedsTotal { total_kb: u64, available_kb: u64 },
}

/// Errors raised while sampling one metric group.
///
/// None of these are fatal: the sampler logs them and retries next cycle.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("source {} unavailable: {source}", .path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseFailure,
    },

    #[error("no {what} matching prefix {prefix:?} in {}", .path.display())]
    NotFound {
        what: &'static str,
        prefix: String,
        path: PathBuf,
    },

    #[error("CPU counters did not advance since the previous sample")]
    DegenerateInterval,
}

/// Read access to the files collectors depend on.
///
/// Production code uses [`RealFs`](crate::sources::RealFs); tests swap in an
/// in-memory implementation.
pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}
