// Scheduler tuning knobs
//
// Capacity is fixed at build time through the const generic on
// Scheduler (default MAX_TASKS). The two policies below pick between
// the due-check and duration-estimate conventions an application can
// rely on; both default to the drift-free / smoothed behaviour.

use core::fmt;

use crate::task::TaskInfo;
use crate::time::{self, Micros};

/// Default number of task slots in a scheduler.
pub const MAX_TASKS: usize = 10;

/// How an interval task's `next_execution_micros` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuePolicy {
    /// `next` holds the last release time. Due once a full interval has
    /// elapsed since it.
    #[default]
    Elapsed,
    /// `next` holds the deadline itself. Due once `now` reaches it.
    Deadline,
}

impl DuePolicy {
    pub fn is_due(self, now: Micros, info: &TaskInfo) -> bool {
        match self {
            DuePolicy::Elapsed => {
                time::elapsed(info.next_execution_micros(), now)
                    >= info.execution_interval_micros()
            }
            DuePolicy::Deadline => time::has_reached(now, info.next_execution_micros()),
        }
    }

    /// The instant at which the task next becomes due.
    pub fn upcoming(self, info: &TaskInfo) -> Micros {
        match self {
            DuePolicy::Elapsed => info
                .next_execution_micros()
                .wrapping_add(info.execution_interval_micros()),
            DuePolicy::Deadline => info.next_execution_micros(),
        }
    }
}

/// How per-task loop duration is estimated for idle slack fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Estimator {
    /// Exponential moving average, decay 0.5.
    #[default]
    Smoothed,
    /// Largest duration ever observed.
    PeakHold,
}

impl Estimator {
    pub const fn update(self, estimate: Micros, sample: Micros) -> Micros {
        match self {
            Estimator::Smoothed => ((estimate as u64 + sample as u64) / 2) as Micros,
            Estimator::PeakHold => {
                if sample > estimate {
                    sample
                } else {
                    estimate
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerConfig {
    pub due: DuePolicy,
    pub estimator: Estimator,
}

impl SchedulerConfig {
    pub const fn new() -> Self {
        Self {
            due: DuePolicy::Elapsed,
            estimator: Estimator::Smoothed,
        }
    }

    pub const fn with_due_policy(mut self, due: DuePolicy) -> Self {
        self.due = due;
        self
    }

    pub const fn with_estimator(mut self, estimator: Estimator) -> Self {
        self.estimator = estimator;
        self
    }
}

impl fmt::Display for SchedulerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "due={:?} estimator={:?}", self.due, self.estimator)
    }
}
