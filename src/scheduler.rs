// Cooperative interval/idle scheduler
// NOTE: No dynamic allocation; tasks are borrowed, never owned.
//
// One call to `run` is one cycle: every admitted task is visited once,
// in admission order, and is set up, dispatched, or skipped. Interval
// tasks are released on a drift-free grid (next += interval). Idle
// tasks run only if their duration estimate fits before the earliest
// upcoming interval deadline. Time outside task loops is billed to
// scheduler overhead.

use core::fmt;

use crate::config::{MAX_TASKS, SchedulerConfig};
use crate::monitor::{CpuAccounting, Utilization};
use crate::queue::TaskQueue;
use crate::task::{Task, TaskClass, TaskId, TaskInfo, TaskResponse, TaskState};
use crate::time::{self, Clock, Micros};

pub enum ScheduleError<'t, 'r> {
    /// Every slot is taken; contains the rejected task.
    Full(&'t mut Task<'r>),
}

impl<'t, 'r> ScheduleError<'t, 'r> {
    /// Take the rejected task back.
    pub fn into_task(self) -> &'t mut Task<'r> {
        match self {
            ScheduleError::Full(task) => task,
        }
    }
}

impl fmt::Display for ScheduleError<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Full(task) => write!(f, "task queue full, rejected {}", task.info),
        }
    }
}

impl fmt::Debug for ScheduleError<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::Full(task) => f.debug_tuple("Full").field(&task.info).finish(),
        }
    }
}

pub struct Scheduler<'t, 'r, C, const N: usize = MAX_TASKS> {
    queue: TaskQueue<'t, 'r, N>,
    clock: C,
    config: SchedulerConfig,
    accounting: &'t CpuAccounting,
    admitted: TaskId,
    // earliest upcoming interval deadline seen by the last cycle
    time_of_next_exec: Option<Micros>,
}

impl<'t, 'r, C: Clock, const N: usize> Scheduler<'t, 'r, C, N> {
    pub fn new(clock: C, accounting: &'t CpuAccounting) -> Self {
        Self::with_config(clock, accounting, SchedulerConfig::new())
    }

    pub fn with_config(clock: C, accounting: &'t CpuAccounting, config: SchedulerConfig) -> Self {
        Self {
            queue: TaskQueue::new(),
            clock,
            config,
            accounting,
            admitted: 0,
            time_of_next_exec: None,
        }
    }

    /// Admit a task, returning its id.
    ///
    /// When every slot is taken the queue is left exactly as it was and
    /// the task comes back inside the error.
    pub fn schedule(&mut self, task: &'t mut Task<'r>) -> Result<TaskId, ScheduleError<'t, 'r>> {
        let slot = match self.queue.insert(task) {
            Ok(slot) => slot,
            Err(task) => {
                log::warn!("sched: queue full ({} slots), rejected {}", N, task.info);
                return Err(ScheduleError::Full(task));
            }
        };

        let now = self.clock.now();
        self.admitted += 1;
        if let Some(t) = self.queue.get_mut(slot) {
            t.info.id = self.admitted;
            t.info.next_execution_micros = now;
            t.info.last_execution_micros = now;
            log::info!("sched: admitted {} at slot {}", t.info, slot);
        }
        Ok(self.admitted)
    }

    /// Run one scheduling cycle.
    pub fn run(&mut self) {
        let Self {
            queue,
            clock,
            config,
            accounting,
            time_of_next_exec,
            ..
        } = self;

        let now = clock.now();
        let mut work: u64 = 0;
        let mut next_exec: Option<Micros> = None;

        for task in queue.iter_mut() {
            match task.info.state {
                TaskState::Uninitialized => {
                    let response = task.routine.setup(now, &task.info);
                    task.info.state = match response {
                        TaskResponse::Continue => TaskState::Running,
                        TaskResponse::Terminate => {
                            log::debug!("sched: {} ended during setup", task.info);
                            TaskState::Killed
                        }
                    };
                    task.info.next_execution_micros = now;
                    task.info.last_execution_micros = now;
                    task.info.executions = task.info.executions.wrapping_add(1);
                }
                TaskState::Running => match task.info.class {
                    TaskClass::Interval => {
                        if config.due.is_due(now, &task.info) {
                            let dt = execute(clock, config, task, now, clock.now());
                            accounting.add_interval(dt);
                            work += dt as u64;
                        }
                    }
                    TaskClass::Idle => {
                        let current = clock.now();
                        let fits = match next_exec {
                            None => true,
                            Some(deadline) => {
                                (task.info.execution_estimate_micros as i64)
                                    < time::offset(current, deadline) as i64
                            }
                        };
                        if fits {
                            let dt = execute(clock, config, task, now, current);
                            accounting.add_idle(dt);
                            work += dt as u64;
                        }
                    }
                },
                TaskState::Killed => continue,
            }

            if task.info.is_interval() && task.info.state == TaskState::Running {
                let upcoming = config.due.upcoming(&task.info);
                next_exec = Some(match next_exec {
                    None => upcoming,
                    Some(earliest) => time::earliest(now, earliest, upcoming),
                });
            }
        }

        let cycle = time::span(now, clock.now()) as u64;
        let overhead = cycle.saturating_sub(work);
        accounting.add_overhead(overhead);
        *time_of_next_exec = next_exec;
        log::trace!("sched: cycle {}us, work {}us", cycle, work);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Admitted tasks in dispatch order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskInfo> + '_ {
        self.queue.iter()
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskInfo> {
        self.queue.iter().find(|info| info.id == id)
    }

    /// Earliest upcoming interval deadline as of the last cycle, or
    /// `None` if no interval task was running.
    pub fn time_of_next_exec(&self) -> Option<Micros> {
        self.time_of_next_exec
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn utilization(&self) -> Utilization {
        self.accounting.utilization()
    }
}

// Call the loop and update the task's timing record. Returns the
// measured duration.
fn execute<C: Clock>(
    clock: &C,
    config: &SchedulerConfig,
    task: &mut Task<'_>,
    now: Micros,
    start: Micros,
) -> Micros {
    let response = task.routine.run(now, &task.info);
    let end = clock.now();
    let dt = time::span(start, end);

    let info = &mut task.info;
    if response == TaskResponse::Terminate {
        log::debug!("sched: {} terminated after {} runs", info, info.executions);
        info.state = TaskState::Killed;
    }
    if info.class == TaskClass::Interval {
        info.next_execution_micros = info
            .next_execution_micros
            .wrapping_add(info.execution_interval_micros);
    }
    info.last_execution_micros = end;
    info.execution_estimate_micros = config.estimator.update(info.execution_estimate_micros, dt);
    info.peak_execution_micros = info.peak_execution_micros.max(dt);
    info.executions = info.executions.wrapping_add(1);
    dt
}
