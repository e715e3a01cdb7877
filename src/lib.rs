// ht-sched: cooperative interval/idle task scheduler, no allocator
// time:      wrapping microsecond clock and modular comparisons
// config:    capacity, due-check and duration-estimate policies
// task:      task descriptors, timing record, routine trait
// queue:     fixed-capacity rank-ordered task list
// scheduler: admission and the per-cycle dispatch loop
// monitor:   CPU time accounting and the utilization monitor task

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod monitor;
pub mod queue;
pub mod scheduler;
pub mod task;
pub mod time;

pub use config::{DuePolicy, Estimator, MAX_TASKS, SchedulerConfig};
pub use monitor::{CpuAccounting, CpuTotals, Utilization, UtilizationMonitor};
pub use scheduler::{ScheduleError, Scheduler};
pub use task::{
    FnRoutine, Noop, Priority, Routine, Task, TaskClass, TaskId, TaskInfo, TaskResponse,
    TaskState, from_fn,
};
pub use time::{Clock, Micros};
