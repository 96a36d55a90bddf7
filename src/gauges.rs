//! # Gauge Store
//!
//! The fixed set of twelve gauges procwatch publishes, and the store that holds
//! their latest values.
//!
//! Gauges are partitioned into [`MetricGroup`]s. Each group sits behind its own
//! `RwLock`: the sampler writes a whole group inside one critical section, and
//! a render holds every group's read lock, so a scrape never sees, say,
//! `total_memory` from one sample and `used_memory` from another. Unrelated
//! groups never contend on writes.
//!
//! Values are mirrored into a private `PrometheusRecorder` (never installed as
//! the global recorder) which produces the exposition text.

use crate::core::MetricGroup;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::warn;

/// One published metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gauge {
    CpuUsagePercent,
    MemoryUsagePercent,
    TotalMemory,
    FreeMemory,
    UsedMemory,
    DiskReads,
    DiskWrites,
    DiskTotalTime,
    NetworkRxBytes,
    NetworkTxBytes,
    RunningProcesses,
    ContextSwitches,
}

impl Gauge {
    pub const ALL: [Gauge; 12] = [
        Gauge::CpuUsagePercent,
        Gauge::MemoryUsagePercent,
        Gauge::TotalMemory,
        Gauge::FreeMemory,
        Gauge::UsedMemory,
        Gauge::DiskReads,
        Gauge::DiskWrites,
        Gauge::DiskTotalTime,
        Gauge::NetworkRxBytes,
        Gauge::NetworkTxBytes,
        Gauge::RunningProcesses,
        Gauge::ContextSwitches,
    ];

    /// The stable exposition name.
    pub fn name(&self) -> &'static str {
        match self {
            Gauge::CpuUsagePercent => "cpu_usage_percent",
            Gauge::MemoryUsagePercent => "memory_usage_percent",
            Gauge::TotalMemory => "total_memory",
            Gauge::FreeMemory => "free_memory",
            Gauge::UsedMemory => "used_memory",
            Gauge::DiskReads => "disk_reads",
            Gauge::DiskWrites => "disk_writes",
            Gauge::DiskTotalTime => "disk_total_time",
            Gauge::NetworkRxBytes => "network_rx_bytes",
            Gauge::NetworkTxBytes => "network_tx_bytes",
            Gauge::RunningProcesses => "running_processes",
            Gauge::ContextSwitches => "context_switches",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Gauge::CpuUsagePercent => "Percentage of CPU time spent busy since the previous sample.",
            Gauge::MemoryUsagePercent => "Percentage of memory in use (total minus available).",
            Gauge::TotalMemory => "Total usable memory in kB.",
            Gauge::FreeMemory => "Memory available for new allocations in kB.",
            Gauge::UsedMemory => "Memory in use in kB.",
            Gauge::DiskReads => "Reads completed on the selected disk since boot.",
            Gauge::DiskWrites => "Writes completed on the selected disk since boot.",
            Gauge::DiskTotalTime => "Milliseconds the selected disk spent doing I/O since boot.",
            Gauge::NetworkRxBytes => "Bytes received on the selected interface since boot.",
            Gauge::NetworkTxBytes => "Bytes transmitted on the selected interface since boot.",
            Gauge::RunningProcesses => "Number of processes currently runnable.",
            Gauge::ContextSwitches => "Context switches since boot.",
        }
    }

    /// The group this gauge is published with.
    pub fn group(&self) -> MetricGroup {
        match self {
            Gauge::CpuUsagePercent => MetricGroup::Cpu,
            Gauge::MemoryUsagePercent
            | Gauge::TotalMemory
            | Gauge::FreeMemory
            | Gauge::UsedMemory => MetricGroup::Memory,
            Gauge::DiskReads | Gauge::DiskWrites | Gauge::DiskTotalTime => MetricGroup::Diskstats,
            Gauge::NetworkRxBytes | Gauge::NetworkTxBytes => MetricGroup::Network,
            Gauge::RunningProcesses | Gauge::ContextSwitches => MetricGroup::Processes,
        }
    }
}

struct Cell {
    gauge: Gauge,
    value: f64,
    handle: metrics::Gauge,
}

/// Latest value of every gauge, grouped for atomic publication.
///
/// Share it as `Arc<GaugeStore>` between the sampler (sole writer) and the
/// exposition server (any number of readers).
pub struct GaugeStore {
    handle: PrometheusHandle,
    groups: [RwLock<Vec<Cell>>; 5],
    _recorder: PrometheusRecorder,
}

impl std::fmt::Debug for GaugeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GaugeStore").finish_non_exhaustive()
    }
}

impl Default for GaugeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeStore {
    /// Creates a store with every gauge registered and set to `0`.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let groups = std::array::from_fn(|index| {
            let group = MetricGroup::ALL[index];
            let cells = Gauge::ALL
                .iter()
                .filter(|gauge| gauge.group() == group)
                .map(|&gauge| {
                    let handle = metrics::with_local_recorder(&recorder, || {
                        metrics::describe_gauge!(gauge.name(), gauge.help());
                        metrics::gauge!(gauge.name())
                    });
                    handle.set(0.0);
                    Cell {
                        gauge,
                        value: 0.0,
                        handle,
                    }
                })
                .collect();
            RwLock::new(cells)
        });

        Self {
            handle,
            groups,
            _recorder: recorder,
        }
    }

    // Cells hold plain numbers, so a writer that panicked mid-update cannot
    // leave them in an unusable state.
    fn read(&self, group: MetricGroup) -> RwLockReadGuard<'_, Vec<Cell>> {
        self.groups[group.index()]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, group: MetricGroup) -> RwLockWriteGuard<'_, Vec<Cell>> {
        self.groups[group.index()]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites a single gauge.
    pub fn set(&self, gauge: Gauge, value: f64) {
        self.update(gauge.group(), &[(gauge, value)]);
    }

    /// Overwrites several gauges of `group` in one critical section.
    ///
    /// Gauges that do not belong to `group` are ignored.
    pub fn update(&self, group: MetricGroup, values: &[(Gauge, f64)]) {
        let mut cells = self.write(group);
        for &(gauge, value) in values {
            match cells.iter_mut().find(|cell| cell.gauge == gauge) {
                Some(cell) => {
                    cell.value = value;
                    cell.handle.set(value);
                }
                None => warn!(
                    gauge = gauge.name(),
                    %group,
                    "Gauge does not belong to the updated group; ignored."
                ),
            }
        }
    }

    /// The last value set for `gauge`, or `0.0` if it was never set.
    pub fn get(&self, gauge: Gauge) -> f64 {
        self.read(gauge.group())
            .iter()
            .find(|cell| cell.gauge == gauge)
            .map(|cell| cell.value)
            .unwrap_or_default()
    }

    /// The values of one group, read under its lock.
    pub fn group_values(&self, group: MetricGroup) -> Vec<(Gauge, f64)> {
        self.read(group)
            .iter()
            .map(|cell| (cell.gauge, cell.value))
            .collect()
    }

    /// Every gauge's value. Each group is internally consistent; different
    /// groups may come from different sampling cycles.
    pub fn snapshot(&self) -> Vec<(Gauge, f64)> {
        MetricGroup::ALL
            .iter()
            .flat_map(|&group| self.group_values(group))
            .collect()
    }

    /// Renders every gauge in the Prometheus text exposition format.
    ///
    /// All group read locks are held (acquired in [`MetricGroup::ALL`] order)
    /// while the text is produced, so no group is observed half-written.
    pub fn render(&self) -> String {
        let _guards: Vec<_> = MetricGroup::ALL
            .iter()
            .map(|&group| self.read(group))
            .collect();
        self.handle.render()
    }
}
