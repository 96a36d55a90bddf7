use procwatch::core::{CollectError, FileSystem, MetricGroup};
use procwatch::gauges::{Gauge, GaugeStore};
use procwatch::sampler::{GroupOutcome, Sampler, Selectors};
use procwatch::sources::test_utils::{fixtures, MockFs};
use procwatch::sources::ProcSource;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn sampler_over(fs: &MockFs) -> (Sampler, Arc<GaugeStore>) {
    let store = Arc::new(GaugeStore::new());
    let source = ProcSource::new(Arc::new(fs.clone()), "/proc");
    (Sampler::new(source, store.clone()), store)
}

#[test]
fn test_typical_system_populates_every_group() {
    let fs = MockFs::typical_system();
    let (mut sampler, store) = sampler_over(&fs);

    let report = sampler.sample_once();

    assert!(matches!(
        report.outcome(MetricGroup::Cpu),
        Some(GroupOutcome::Primed)
    ));
    assert_eq!(
        report.updated(),
        vec![
            MetricGroup::Memory,
            MetricGroup::Diskstats,
            MetricGroup::Network,
            MetricGroup::Processes
        ]
    );
    assert!(report.failed().is_empty());

    assert_eq!(store.get(Gauge::TotalMemory), 16_000_000.0);
    assert_eq!(store.get(Gauge::FreeMemory), 4_000_000.0);
    assert_eq!(store.get(Gauge::UsedMemory), 12_000_000.0);
    assert_eq!(store.get(Gauge::MemoryUsagePercent), 75.0);
    assert_eq!(store.get(Gauge::DiskReads), 12345.0);
    assert_eq!(store.get(Gauge::DiskWrites), 23456.0);
    assert_eq!(store.get(Gauge::DiskTotalTime), 9876.0);
    assert_eq!(store.get(Gauge::NetworkRxBytes), 987_654_321.0);
    assert_eq!(store.get(Gauge::NetworkTxBytes), 123_456_789.0);
    assert_eq!(store.get(Gauge::RunningProcesses), 3.0);
    assert_eq!(store.get(Gauge::ContextSwitches), 1_990_473.0);
    // Nothing to compare the first snapshot against yet.
    assert_eq!(store.get(Gauge::CpuUsagePercent), 0.0);
}

#[test]
fn test_cpu_usage_from_consecutive_cycles() {
    let fs = MockFs::typical_system();
    let (mut sampler, store) = sampler_over(&fs);

    sampler.sample_once();
    fs.set_file("/proc/stat", fixtures::STAT_LATER);
    let report = sampler.sample_once();

    assert!(matches!(
        report.outcome(MetricGroup::Cpu),
        Some(GroupOutcome::Updated)
    ));
    assert_eq!(store.get(Gauge::CpuUsagePercent), 60.0);
    assert_eq!(store.get(Gauge::RunningProcesses), 2.0);
    assert_eq!(store.get(Gauge::ContextSwitches), 1_990_611.0);
}

#[test]
fn test_missing_source_keeps_previous_values_and_spares_other_groups() {
    let fs = MockFs::typical_system();
    let (mut sampler, store) = sampler_over(&fs);
    sampler.sample_once();

    fs.remove_file("/proc/meminfo");
    fs.set_file("/proc/stat", fixtures::STAT_LATER);
    let report = sampler.sample_once();

    match report.outcome(MetricGroup::Memory) {
        Some(GroupOutcome::Failed(CollectError::SourceUnavailable { path, .. })) => {
            assert_eq!(path, Path::new("/proc/meminfo"));
        }
        other => panic!("unexpected memory outcome: {:?}", other),
    }
    assert_eq!(report.failed(), vec![MetricGroup::Memory]);
    assert_eq!(store.get(Gauge::TotalMemory), 16_000_000.0);
    assert_eq!(store.get(Gauge::MemoryUsagePercent), 75.0);

    // The other groups were still sampled in the same cycle.
    assert_eq!(
        report.updated(),
        vec![
            MetricGroup::Cpu,
            MetricGroup::Diskstats,
            MetricGroup::Network,
            MetricGroup::Processes
        ]
    );
    assert_eq!(store.get(Gauge::DiskReads), 12345.0);
    assert_eq!(store.get(Gauge::NetworkTxBytes), 123_456_789.0);
    assert_eq!(store.get(Gauge::CpuUsagePercent), 60.0);
    assert_eq!(store.get(Gauge::ContextSwitches), 1_990_611.0);
}

#[test]
fn test_overflowing_cpu_counters_do_not_stop_sampling() {
    let fs = MockFs::typical_system();
    fs.set_file(
        "/proc/stat",
        "cpu  18446744073709551615 1 0 0 0 0 0 0\nctxt 42\nprocs_running 1\n",
    );
    let (mut sampler, store) = sampler_over(&fs);

    sampler.sample_once();
    let report = sampler.sample_once();

    assert!(matches!(
        report.outcome(MetricGroup::Cpu),
        Some(GroupOutcome::Failed(CollectError::DegenerateInterval))
    ));
    assert_eq!(store.get(Gauge::CpuUsagePercent), 0.0);
    assert_eq!(store.get(Gauge::ContextSwitches), 42.0);

    // Sane counters afterwards are compared against each other again.
    fs.set_file("/proc/stat", fixtures::STAT);
    sampler.sample_once();
    fs.set_file("/proc/stat", fixtures::STAT_LATER);
    sampler.sample_once();
    assert_eq!(store.get(Gauge::CpuUsagePercent), 60.0);
}

#[test]
fn test_unparseable_source_is_reported_as_parse_failure() {
    let fs = MockFs::typical_system();
    fs.set_file("/proc/meminfo", "MemFree: 100 kB\n");
    let (mut sampler, store) = sampler_over(&fs);

    let report = sampler.sample_once();

    assert!(matches!(
        report.outcome(MetricGroup::Memory),
        Some(GroupOutcome::Failed(CollectError::Parse { .. }))
    ));
    assert_eq!(store.get(Gauge::TotalMemory), 0.0);
}

#[test]
fn test_missing_interface_is_not_found() {
    let fs = MockFs::typical_system();
    fs.set_file("/proc/net/dev", fixtures::NET_DEV_WIRED_ONLY);
    let (mut sampler, store) = sampler_over(&fs);

    let report = sampler.sample_once();

    match report.outcome(MetricGroup::Network) {
        Some(GroupOutcome::Failed(CollectError::NotFound { prefix, .. })) => {
            assert_eq!(prefix, "wlp");
        }
        other => panic!("unexpected network outcome: {:?}", other),
    }
    assert_eq!(store.get(Gauge::NetworkRxBytes), 0.0);
}

#[test]
fn test_selectors_pick_other_rows() {
    let fs = MockFs::typical_system();
    fs.set_file("/proc/net/dev", fixtures::NET_DEV_WIRED_ONLY);
    let (sampler, store) = sampler_over(&fs);
    let mut sampler = sampler.with_selectors(Selectors {
        disk_device_prefix: "sdb".to_string(),
        network_interface_prefix: "enp".to_string(),
    });

    let report = sampler.sample_once();

    assert!(report.failed().is_empty());
    assert_eq!(store.get(Gauge::DiskReads), 555.0);
    assert_eq!(store.get(Gauge::DiskWrites), 666.0);
    assert_eq!(store.get(Gauge::DiskTotalTime), 777.0);
    assert!(store.get(Gauge::NetworkRxBytes) > 0.0);
}

#[test]
fn test_disabled_groups_are_not_sampled() {
    let fs = MockFs::typical_system();
    let (sampler, store) = sampler_over(&fs);
    let mut sampler = sampler.with_enabled_groups([MetricGroup::Network]);

    let report = sampler.sample_once();

    for group in [MetricGroup::Cpu, MetricGroup::Memory, MetricGroup::Diskstats] {
        assert!(matches!(
            report.outcome(group),
            Some(GroupOutcome::Disabled)
        ));
    }
    assert_eq!(
        report.updated(),
        vec![MetricGroup::Network, MetricGroup::Processes]
    );
    assert_eq!(store.get(Gauge::TotalMemory), 0.0);
    assert_eq!(store.get(Gauge::RunningProcesses), 3.0);
}

/// Delays every read of one file.
struct SlowFs {
    inner: MockFs,
    slow_path: &'static str,
    delay: Duration,
}

impl FileSystem for SlowFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        if path == Path::new(self.slow_path) {
            std::thread::sleep(self.delay);
        }
        self.inner.read_to_string(path)
    }
}

#[test]
fn test_slow_source_stalls_the_whole_cycle() {
    let delay = Duration::from_millis(200);
    let fs = SlowFs {
        inner: MockFs::typical_system(),
        slow_path: "/proc/meminfo",
        delay,
    };
    let store = Arc::new(GaugeStore::new());
    let mut sampler = Sampler::new(ProcSource::new(Arc::new(fs), "/proc"), store.clone());

    let started = Instant::now();
    let report = sampler.sample_once();

    // Reads have no timeout: the cycle waits for the slow read and still
    // completes every group.
    assert!(started.elapsed() >= delay);
    assert!(report.failed().is_empty());
    assert_eq!(store.get(Gauge::TotalMemory), 16_000_000.0);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let fs = MockFs::typical_system();
    let (sampler, store) = sampler_over(&fs);
    let sampler = sampler.with_interval(Duration::from_millis(20));
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = tokio::spawn(sampler.run(rx));
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(true).unwrap();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sampler did not stop")
        .unwrap();
    assert_eq!(store.get(Gauge::TotalMemory), 16_000_000.0);
}
