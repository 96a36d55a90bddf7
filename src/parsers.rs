//! Parsers for the `/proc` text sources.
//!
//! These are pure functions of the input text (plus a selector for the
//! multi-row tables), so they are tested with literal fixture strings.

use crate::core::{
    CpuSnapshot, DiskSample, MemorySample, NetworkSample, ParseFailure, ProcessCounters,
};

/// Default device-name prefix used to pick a row out of `/proc/diskstats`.
pub const DEFAULT_DISK_DEVICE_PREFIX: &str = "sda";

/// Default interface-name prefix used to pick a row out of `/proc/net/dev`.
pub const DEFAULT_NETWORK_INTERFACE_PREFIX: &str = "wlp";

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ParseFailure> {
    value.parse().map_err(|_| ParseFailure::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

/// Parses `/proc/meminfo` content.
///
/// Only `MemTotal` and `MemAvailable` are read; scanning stops as soon as both
/// have been seen.
pub fn parse_meminfo(content: &str) -> Result<MemorySample, ParseFailure> {
    let mut total = None;
    let mut available = None;

    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        // Format: "Key:   <value> kB"
        let value = rest.split_whitespace().next().unwrap_or_default();
        match key.trim() {
            "MemTotal" => total = Some(parse_u64("MemTotal", value)?),
            "MemAvailable" => available = Some(parse_u64("MemAvailable", value)?),
            _ => continue,
        }

        if total.is_some() && available.is_some() {
            break;
        }
    }

    let total_kb = total.ok_or(ParseFailure::MissingField("MemTotal"))?;
    let available_kb = available.ok_or(ParseFailure::MissingField("MemAvailable"))?;
    MemorySample::from_counters(total_kb, available_kb)
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// The per-core `cpuN` lines are ignored. Exactly the first eight counters are
/// read; kernels that report fewer are rejected.
pub fn parse_cpu_line(content: &str) -> Result<CpuSnapshot, ParseFailure> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .ok_or(ParseFailure::MissingField("cpu"))?;

    let fields: Vec<&str> = line.split_whitespace().skip(1).take(8).collect();
    if fields.len() < 8 {
        return Err(ParseFailure::TooFewFields {
            expected: 8,
            found: fields.len(),
        });
    }

    Ok(CpuSnapshot {
        user: parse_u64("user", fields[0])?,
        nice: parse_u64("nice", fields[1])?,
        system: parse_u64("system", fields[2])?,
        idle: parse_u64("idle", fields[3])?,
        iowait: parse_u64("iowait", fields[4])?,
        irq: parse_u64("irq", fields[5])?,
        softirq: parse_u64("softirq", fields[6])?,
        steal: parse_u64("steal", fields[7])?,
    })
}

/// Parses `/proc/diskstats` and returns the first device whose name starts
/// with `prefix`.
///
/// Selection is first-match: with the prefix `sda`, the whole disk `sda` wins
/// over its partitions because it is listed first, and nothing is summed.
/// Rows that do not parse are skipped. `Ok(None)` means no row matched.
pub fn parse_diskstats(content: &str, prefix: &str) -> Result<Option<DiskSample>, ParseFailure> {
    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 13 {
            continue;
        }

        if !parts[2].starts_with(prefix) {
            continue;
        }
        if let Ok(sample) = parse_disk_row(&parts) {
            return Ok(Some(sample));
        }
    }

    Ok(None)
}

// Format: major minor name reads r_merged r_sectors r_time writes w_merged
// w_sectors w_time in_flight io_time weighted_io_time ...
fn parse_disk_row(parts: &[&str]) -> Result<DiskSample, ParseFailure> {
    Ok(DiskSample {
        device: parts[2].to_string(),
        reads: parse_u64("reads", parts[3])?,
        writes: parse_u64("writes", parts[7])?,
        total_time_ms: parse_u64("io_time", parts[12])?,
    })
}

/// Parses `/proc/net/dev` and returns the first interface whose name starts
/// with `prefix`.
///
/// `Ok(None)` is the "not found" outcome. A matching row that is truncated or
/// carries non-numeric counters is a [`ParseFailure`].
pub fn parse_net_dev(content: &str, prefix: &str) -> Result<Option<NetworkSample>, ParseFailure> {
    for line in content.lines() {
        // Skip header lines
        if line.contains('|') {
            continue;
        }
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let interface = name.trim();
        if !interface.starts_with(prefix) {
            continue;
        }

        // rx: bytes packets errs drop fifo frame compressed multicast
        // tx: bytes packets errs drop fifo colls carrier compressed
        let values: Vec<&str> = counters.split_whitespace().collect();
        if values.len() < 9 {
            return Err(ParseFailure::TooFewFields {
                expected: 9,
                found: values.len(),
            });
        }

        return Ok(Some(NetworkSample {
            interface: interface.to_string(),
            rx_bytes: parse_u64("rx_bytes", values[0])?,
            tx_bytes: parse_u64("tx_bytes", values[8])?,
        }));
    }

    Ok(None)
}

/// Parses the `ctxt` and `procs_running` lines of `/proc/stat`.
pub fn parse_process_counters(content: &str) -> Result<ProcessCounters, ParseFailure> {
    let mut context_switches = None;
    let mut running_processes = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("ctxt"), Some(value)) => {
                context_switches = Some(parse_u64("ctxt", value)?);
            }
            (Some("procs_running"), Some(value)) => {
                running_processes = Some(parse_u64("procs_running", value)?);
            }
            _ => continue,
        }

        if context_switches.is_some() && running_processes.is_some() {
            break;
        }
    }

    Ok(ProcessCounters {
        context_switches: context_switches.ok_or(ParseFailure::MissingField("ctxt"))?,
        running_processes: running_processes
            .ok_or(ParseFailure::MissingField("procs_running"))?,
    })
}
