// CPU time accounting and the utilization monitor task
//
// CpuAccounting is shared between the scheduler (which adds to it every
// cycle) and UtilizationMonitor (which samples and clears it). Both live
// on the one thread of control, so plain Cells are enough.
//
// Each monitor run closes one measurement window:
//   total = interval + idle + overhead
//   fractions = each / total, then all three accumulators go back to 0
// An empty window (total == 0) keeps the previous fractions.

use core::cell::Cell;
use core::fmt;

use crate::task::{Routine, TaskInfo, TaskResponse};
use crate::time::Micros;

/// Fractions of one measurement window. Sums to 1.0 once a window with
/// data has been sampled; all zero before that.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Utilization {
    periodic: f32,
    idle: f32,
    scheduler: f32,
}

impl Utilization {
    /// Share spent in interval task loops.
    pub fn periodic(&self) -> f32 {
        self.periodic
    }

    /// Share spent in idle task loops.
    pub fn idle(&self) -> f32 {
        self.idle
    }

    /// Share spent in the dispatch loop itself.
    pub fn scheduler(&self) -> f32 {
        self.scheduler
    }
}

impl fmt::Display for Utilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "periodic {:.1}%, idle {:.1}%, sched {:.1}%",
            self.periodic * 100.0,
            self.idle * 100.0,
            self.scheduler * 100.0
        )
    }
}

/// Raw accumulator values, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTotals {
    pub interval: u64,
    pub idle: u64,
    pub overhead: u64,
}

impl CpuTotals {
    pub fn total(&self) -> u64 {
        self.interval + self.idle + self.overhead
    }
}

pub struct CpuAccounting {
    interval: Cell<u64>,
    idle: Cell<u64>,
    overhead: Cell<u64>,
    latest: Cell<Utilization>,
    samples: Cell<u32>,
}

impl CpuAccounting {
    pub const fn new() -> Self {
        Self {
            interval: Cell::new(0),
            idle: Cell::new(0),
            overhead: Cell::new(0),
            latest: Cell::new(Utilization {
                periodic: 0.0,
                idle: 0.0,
                scheduler: 0.0,
            }),
            samples: Cell::new(0),
        }
    }

    pub(crate) fn add_interval(&self, dt: Micros) {
        bump(&self.interval, dt as u64);
    }

    pub(crate) fn add_idle(&self, dt: Micros) {
        bump(&self.idle, dt as u64);
    }

    pub(crate) fn add_overhead(&self, dt: u64) {
        bump(&self.overhead, dt);
    }

    /// Zero the three accumulators. The last sample is kept.
    pub fn reset(&self) {
        self.interval.set(0);
        self.idle.set(0);
        self.overhead.set(0);
    }

    pub fn totals(&self) -> CpuTotals {
        CpuTotals {
            interval: self.interval.get(),
            idle: self.idle.get(),
            overhead: self.overhead.get(),
        }
    }

    /// Close the current window. Returns the new fractions, or `None`
    /// if nothing was measured since the last reset.
    pub fn sample(&self) -> Option<Utilization> {
        let totals = self.totals();
        let total = totals.total();
        self.reset();
        if total == 0 {
            return None;
        }

        let total = total as f32;
        let util = Utilization {
            periodic: totals.interval as f32 / total,
            idle: totals.idle as f32 / total,
            scheduler: totals.overhead as f32 / total,
        };
        self.latest.set(util);
        self.samples.set(self.samples.get().wrapping_add(1));
        Some(util)
    }

    /// Fractions from the most recent non-empty window.
    pub fn utilization(&self) -> Utilization {
        self.latest.get()
    }

    /// Number of non-empty windows sampled so far.
    pub fn samples(&self) -> u32 {
        self.samples.get()
    }
}

impl Default for CpuAccounting {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn bump(cell: &Cell<u64>, dt: u64) {
    cell.set(cell.get().saturating_add(dt));
}

/// Interval routine that samples a [`CpuAccounting`] each time it runs.
///
/// Schedule it with [`Task::interval`](crate::Task::interval); the
/// interval is the measurement window.
pub struct UtilizationMonitor<'a> {
    accounting: &'a CpuAccounting,
}

impl<'a> UtilizationMonitor<'a> {
    pub const fn new(accounting: &'a CpuAccounting) -> Self {
        Self { accounting }
    }

    pub fn utilization(&self) -> Utilization {
        self.accounting.utilization()
    }
}

impl Routine for UtilizationMonitor<'_> {
    fn setup(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        self.accounting.reset();
        TaskResponse::Continue
    }

    fn run(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        match self.accounting.sample() {
            Some(util) => log::debug!("schedmon: {}", util),
            None => log::trace!("schedmon: empty window"),
        }
        TaskResponse::Continue
    }
}
