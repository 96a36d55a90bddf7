//! # Sampling Loop
//!
//! The `Sampler` is the sole writer to the [`GaugeStore`]. Once per interval it
//! reads each enabled source, parses it, and publishes the result as one group
//! update. Every group is sampled independently: a missing file or a parse
//! failure in one group is logged and leaves that group's gauges at their
//! previous values, while the remaining groups are still updated in the same
//! cycle.
//!
//! Source reads are plain blocking reads with no timeout. A read that hangs
//! stalls the whole cycle.

use crate::core::{CollectError, MetricGroup, ParseFailure};
use crate::cpu::{CpuDeltaEngine, CpuReading};
use crate::gauges::{Gauge, GaugeStore};
use crate::parsers::{
    self, DEFAULT_DISK_DEVICE_PREFIX, DEFAULT_NETWORK_INTERFACE_PREFIX,
};
use crate::sources::{ProcSource, SourceKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_secs(1);

/// Prefixes used to pick one row out of the multi-row sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selectors {
    pub disk_device_prefix: String,
    pub network_interface_prefix: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            disk_device_prefix: DEFAULT_DISK_DEVICE_PREFIX.to_string(),
            network_interface_prefix: DEFAULT_NETWORK_INTERFACE_PREFIX.to_string(),
        }
    }
}

/// What happened to one group during a cycle.
#[derive(Debug)]
pub enum GroupOutcome {
    /// The group's gauges were overwritten.
    Updated,
    /// The CPU engine stored its first snapshot; nothing was published.
    Primed,
    /// The group is not in the enabled subset.
    Disabled,
    /// Reading or parsing failed; the gauges keep their previous values.
    Failed(CollectError),
}

/// Per-group results of one [`Sampler::sample_once`] call, in sampling order.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<(MetricGroup, GroupOutcome)>,
}

impl CycleReport {
    pub fn outcome(&self, group: MetricGroup) -> Option<&GroupOutcome> {
        self.outcomes
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, outcome)| outcome)
    }

    pub fn updated(&self) -> Vec<MetricGroup> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, GroupOutcome::Updated))
            .map(|(group, _)| *group)
            .collect()
    }

    pub fn failed(&self) -> Vec<MetricGroup> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, GroupOutcome::Failed(_)))
            .map(|(group, _)| *group)
            .collect()
    }
}

/// Periodically samples `/proc` into a [`GaugeStore`].
pub struct Sampler {
    source: ProcSource,
    store: Arc<GaugeStore>,
    cpu: CpuDeltaEngine,
    selectors: Selectors,
    enabled: BTreeSet<MetricGroup>,
    interval: Duration,
}

impl Sampler {
    /// Creates a sampler with every group enabled, the default selectors and
    /// the default one-second interval.
    pub fn new(source: ProcSource, store: Arc<GaugeStore>) -> Self {
        Self {
            source,
            store,
            cpu: CpuDeltaEngine::new(),
            selectors: Selectors::default(),
            enabled: MetricGroup::ALL.into_iter().collect(),
            interval: DEFAULT_SAMPLING_INTERVAL,
        }
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    /// Restricts sampling to `groups`. Process counters are always sampled.
    pub fn with_enabled_groups(mut self, groups: impl IntoIterator<Item = MetricGroup>) -> Self {
        self.enabled = groups.into_iter().collect();
        self.enabled.insert(MetricGroup::Processes);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn store(&self) -> &Arc<GaugeStore> {
        &self.store
    }

    /// Runs one sampling cycle over every group.
    pub fn sample_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();

        for group in MetricGroup::ALL {
            let outcome = if !self.enabled.contains(&group) {
                GroupOutcome::Disabled
            } else {
                match self.sample_group(group) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(%group, error = %e, "Failed to sample metric group; keeping previous values.");
                        GroupOutcome::Failed(e)
                    }
                }
            };
            trace!(%group, ?outcome, "Group sampled");
            report.outcomes.push((group, outcome));
        }

        report
    }

    fn sample_group(&mut self, group: MetricGroup) -> Result<GroupOutcome, CollectError> {
        match group {
            MetricGroup::Cpu => self.sample_cpu(),
            MetricGroup::Memory => self.sample_memory(),
            MetricGroup::Diskstats => self.sample_disk(),
            MetricGroup::Network => self.sample_network(),
            MetricGroup::Processes => self.sample_processes(),
        }
    }

    /// Reads `kind` and runs `parse` over it, tagging failures with the path.
    fn read_parsed<T>(
        &self,
        kind: SourceKind,
        parse: impl FnOnce(&str) -> Result<T, ParseFailure>,
    ) -> Result<T, CollectError> {
        let text = self.source.read(kind)?;
        parse(&text).map_err(|source| CollectError::Parse {
            path: self.source.path_of(kind),
            source,
        })
    }

    fn sample_cpu(&mut self) -> Result<GroupOutcome, CollectError> {
        let snapshot = self.read_parsed(SourceKind::Stat, parsers::parse_cpu_line)?;
        match self.cpu.observe(snapshot)? {
            CpuReading::Primed => Ok(GroupOutcome::Primed),
            CpuReading::Usage(usage) => {
                self.store.set(Gauge::CpuUsagePercent, usage);
                Ok(GroupOutcome::Updated)
            }
        }
    }

    fn sample_memory(&mut self) -> Result<GroupOutcome, CollectError> {
        let sample = self.read_parsed(SourceKind::MemInfo, parsers::parse_meminfo)?;
        self.store.update(
            MetricGroup::Memory,
            &[
                (Gauge::MemoryUsagePercent, sample.usage_percent),
                (Gauge::TotalMemory, sample.total_kb as f64),
                (Gauge::FreeMemory, sample.available_kb as f64),
                (Gauge::UsedMemory, sample.used_kb as f64),
            ],
        );
        Ok(GroupOutcome::Updated)
    }

    fn sample_disk(&mut self) -> Result<GroupOutcome, CollectError> {
        let prefix = &self.selectors.disk_device_prefix;
        let sample = self
            .read_parsed(SourceKind::DiskStats, |text| {
                parsers::parse_diskstats(text, prefix)
            })?
            .ok_or_else(|| CollectError::NotFound {
                what: "block device",
                prefix: prefix.clone(),
                path: self.source.path_of(SourceKind::DiskStats),
            })?;

        debug!(device = %sample.device, "Disk sampled");
        self.store.update(
            MetricGroup::Diskstats,
            &[
                (Gauge::DiskReads, sample.reads as f64),
                (Gauge::DiskWrites, sample.writes as f64),
                (Gauge::DiskTotalTime, sample.total_time_ms as f64),
            ],
        );
        Ok(GroupOutcome::Updated)
    }

    fn sample_network(&mut self) -> Result<GroupOutcome, CollectError> {
        let prefix = &self.selectors.network_interface_prefix;
        let sample = self
            .read_parsed(SourceKind::NetDev, |text| parsers::parse_net_dev(text, prefix))?
            .ok_or_else(|| CollectError::NotFound {
                what: "network interface",
                prefix: prefix.clone(),
                path: self.source.path_of(SourceKind::NetDev),
            })?;

        debug!(interface = %sample.interface, "Network sampled");
        self.store.update(
            MetricGroup::Network,
            &[
                (Gauge::NetworkRxBytes, sample.rx_bytes as f64),
                (Gauge::NetworkTxBytes, sample.tx_bytes as f64),
            ],
        );
        Ok(GroupOutcome::Updated)
    }

    fn sample_processes(&mut self) -> Result<GroupOutcome, CollectError> {
        let counters = self.read_parsed(SourceKind::Stat, parsers::parse_process_counters)?;
        self.store.update(
            MetricGroup::Processes,
            &[
                (Gauge::RunningProcesses, counters.running_processes as f64),
                (Gauge::ContextSwitches, counters.context_switches as f64),
            ],
        );
        Ok(GroupOutcome::Updated)
    }

    /// Runs the sampling loop until a shutdown signal is received.
    ///
    /// This method should be spawned as a background task. The first cycle
    /// runs immediately.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let enabled: Vec<&str> = self.enabled.iter().map(MetricGroup::as_str).collect();
        info!(
            interval_ms = self.interval.as_millis() as u64,
            groups = ?enabled,
            "Sampler started."
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Sampler received shutdown signal.");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.sample_once();
                    debug!(
                        updated = ?report.updated(),
                        failed = ?report.failed(),
                        "Sampling cycle finished."
                    );
                    trace!(values = ?self.store.snapshot(), "Gauge values after cycle.");
                }
            }
        }
        info!("Sampler finished.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FileSystem;
    use std::collections::HashMap;
    use std::io;
    use std::path::{Path, PathBuf};

    struct FixedFs(HashMap<PathBuf, &'static str>);

    impl FileSystem for FixedFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.0
                .get(path)
                .map(|s| s.to_string())
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
        }
    }

    fn sampler_with(files: &[(&str, &'static str)]) -> Sampler {
        let fs = FixedFs(
            files
                .iter()
                .map(|(path, text)| (PathBuf::from(path), *text))
                .collect(),
        );
        Sampler::new(
            ProcSource::new(Arc::new(fs), "/proc"),
            Arc::new(GaugeStore::new()),
        )
    }

    #[test]
    fn test_first_cycle_primes_cpu() {
        let mut sampler = sampler_with(&[("/proc/stat", "cpu  1 0 1 8 0 0 0 0\nctxt 10\nprocs_running 2\n")]);
        let report = sampler.sample_once();
        assert!(matches!(
            report.outcome(MetricGroup::Cpu),
            Some(GroupOutcome::Primed)
        ));
        assert!(matches!(
            report.outcome(MetricGroup::Processes),
            Some(GroupOutcome::Updated)
        ));
        assert_eq!(sampler.store().get(Gauge::ContextSwitches), 10.0);
        assert_eq!(sampler.store().get(Gauge::RunningProcesses), 2.0);
    }

    #[test]
    fn test_degenerate_interval_keeps_cpu_gauge() {
        let mut sampler = sampler_with(&[("/proc/stat", "cpu  1 0 1 8 0 0 0 0\nctxt 10\nprocs_running 2\n")]);
        sampler.store().set(Gauge::CpuUsagePercent, 12.5);

        sampler.sample_once();
        let report = sampler.sample_once();
        assert!(matches!(
            report.outcome(MetricGroup::Cpu),
            Some(GroupOutcome::Failed(CollectError::DegenerateInterval))
        ));
        assert_eq!(sampler.store().get(Gauge::CpuUsagePercent), 12.5);
    }

    #[test]
    fn test_disabled_groups_are_not_read() {
        let mut sampler = sampler_with(&[("/proc/stat", "cpu  1 0 1 8 0 0 0 0\nctxt 10\nprocs_running 2\n")])
            .with_enabled_groups([MetricGroup::Cpu]);
        let report = sampler.sample_once();

        assert!(matches!(
            report.outcome(MetricGroup::Memory),
            Some(GroupOutcome::Disabled)
        ));
        assert!(matches!(
            report.outcome(MetricGroup::Network),
            Some(GroupOutcome::Disabled)
        ));
        assert!(report.failed().is_empty());
        assert_eq!(report.updated(), vec![MetricGroup::Processes]);
    }

    #[test]
    fn test_missing_interface_is_not_found() {
        let mut sampler = sampler_with(&[(
            "/proc/net/dev",
            "eth0: 1 0 0 0 0 0 0 0 2 0 0 0 0 0 0 0\n",
        )]);
        let report = sampler.sample_once();
        assert!(matches!(
            report.outcome(MetricGroup::Network),
            Some(GroupOutcome::Failed(CollectError::NotFound { .. }))
        ));
        assert_eq!(sampler.store().get(Gauge::NetworkRxBytes), 0.0);
    }

    #[test]
    fn test_custom_selectors() {
        let mut sampler = sampler_with(&[(
            "/proc/net/dev",
            "eth0: 1 0 0 0 0 0 0 0 2 0 0 0 0 0 0 0\n",
        )])
        .with_selectors(Selectors {
            network_interface_prefix: "eth".to_string(),
            ..Selectors::default()
        });
        sampler.sample_once();
        assert_eq!(sampler.store().get(Gauge::NetworkRxBytes), 1.0);
        assert_eq!(sampler.store().get(Gauge::NetworkTxBytes), 2.0);
    }
}
