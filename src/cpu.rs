//! Stateful CPU usage computation.
//!
//! `/proc/stat` only exposes cumulative tick counters, so usage can only be
//! derived from two snapshots. [`CpuDeltaEngine`] owns the previous snapshot
//! and is only ever touched by the sampling loop.

use crate::core::{CollectError, CpuSnapshot};
use tracing::trace;

/// Outcome of feeding a snapshot to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuReading {
    /// First snapshot ever seen: stored as the reference, no usage yet.
    Primed,
    /// Busy percentage over the interval since the previous snapshot, in `[0, 100]`.
    Usage(f64),
}

/// Computes CPU usage from consecutive [`CpuSnapshot`]s.
#[derive(Debug, Default)]
pub struct CpuDeltaEngine {
    previous: Option<CpuSnapshot>,
}

impl CpuDeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a reference snapshot is held.
    pub fn is_primed(&self) -> bool {
        self.previous.is_some()
    }

    pub fn previous(&self) -> Option<&CpuSnapshot> {
        self.previous.as_ref()
    }

    /// Feeds the next snapshot and returns the usage since the previous one.
    ///
    /// The reference snapshot is replaced on every call, including when the
    /// interval is degenerate, so a failed comparison is not retried against
    /// the older reference.
    ///
    /// # Errors
    ///
    /// [`CollectError::DegenerateInterval`] when the total tick count did not
    /// advance (or went backwards) since the previous snapshot, or when either
    /// snapshot's tick sum does not fit in a `u64`.
    pub fn observe(&mut self, current: CpuSnapshot) -> Result<CpuReading, CollectError> {
        let Some(previous) = self.previous.replace(current) else {
            trace!("CPU engine primed");
            return Ok(CpuReading::Primed);
        };

        let (Some(current_total), Some(previous_total), Some(current_idle), Some(previous_idle)) = (
            current.total(),
            previous.total(),
            current.idle_total(),
            previous.idle_total(),
        ) else {
            return Err(CollectError::DegenerateInterval);
        };

        let totald = match current_total.checked_sub(previous_total) {
            Some(delta) if delta > 0 => delta,
            _ => return Err(CollectError::DegenerateInterval),
        };
        let idled = current_idle.saturating_sub(previous_idle);
        let busy = totald.saturating_sub(idled);

        let usage = busy as f64 * 100.0 / totald as f64;
        trace!(totald, idled, usage, "CPU usage computed");
        Ok(CpuReading::Usage(usage.clamp(0.0, 100.0)))
    }
}
