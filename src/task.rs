// Task descriptors: identity, class, timing record and the routine
// the scheduler drives.
//
// A Task is owned by the application; the scheduler only borrows it.
// Callbacks see their own TaskInfo read-only.

use core::fmt;

use crate::time::Micros;

/// Lower value = higher precedence within a class.
pub type Priority = u32;

/// 1-based admission number; 0 means "not admitted".
pub type TaskId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskClass {
    /// Runs at most once per fixed interval.
    Interval,
    /// Runs only in slack before the next interval deadline.
    Idle,
}

impl fmt::Display for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskClass::Interval => write!(f, "interval"),
            TaskClass::Idle => write!(f, "idle"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Uninitialized,
    Running,
    /// Terminal.
    Killed,
}

/// What a routine wants after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskResponse {
    Continue,
    Terminate,
}

impl TaskResponse {
    #[inline]
    pub const fn is_continue(self) -> bool {
        matches!(self, TaskResponse::Continue)
    }
}

impl From<bool> for TaskResponse {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            TaskResponse::Continue
        } else {
            TaskResponse::Terminate
        }
    }
}

/// Identity and timing statistics for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    pub(crate) id: TaskId,
    pub(crate) class: TaskClass,
    pub(crate) priority: Priority,
    pub(crate) state: TaskState,
    pub(crate) execution_interval_micros: Micros,
    pub(crate) last_execution_micros: Micros,
    pub(crate) next_execution_micros: Micros,
    pub(crate) execution_estimate_micros: Micros,
    pub(crate) peak_execution_micros: Micros,
    pub(crate) executions: u32,
}

impl TaskInfo {
    const fn new(class: TaskClass, execution_interval_micros: Micros) -> Self {
        Self {
            id: 0,
            class,
            priority: 0,
            state: TaskState::Uninitialized,
            execution_interval_micros,
            last_execution_micros: 0,
            next_execution_micros: 0,
            execution_estimate_micros: 0,
            peak_execution_micros: 0,
            executions: 0,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn class(&self) -> TaskClass {
        self.class
    }

    pub fn is_interval(&self) -> bool {
        self.class == TaskClass::Interval
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Minimum spacing between runs. Meaningless for idle tasks.
    pub fn execution_interval_micros(&self) -> Micros {
        self.execution_interval_micros
    }

    pub fn last_execution_micros(&self) -> Micros {
        self.last_execution_micros
    }

    pub fn next_execution_micros(&self) -> Micros {
        self.next_execution_micros
    }

    /// Loop duration estimate used for idle slack fitting.
    pub fn execution_estimate_micros(&self) -> Micros {
        self.execution_estimate_micros
    }

    pub fn peak_execution_micros(&self) -> Micros {
        self.peak_execution_micros
    }

    /// Setup plus loop calls so far (wrapping).
    pub fn executions(&self) -> u32 {
        self.executions
    }

    /// Admission order: should `self` sit ahead of `other`?
    ///
    /// Strict, so equal-ranked tasks keep their insertion order.
    pub fn outranks(&self, other: &TaskInfo) -> bool {
        match (self.class, other.class) {
            (TaskClass::Interval, TaskClass::Idle) => true,
            (a, b) if a == b => self.priority < other.priority,
            _ => false,
        }
    }
}

impl fmt::Display for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            TaskClass::Interval => write!(
                f,
                "task {} ({} {}us, prio {})",
                self.id, self.class, self.execution_interval_micros, self.priority
            ),
            TaskClass::Idle => write!(f, "task {} ({}, prio {})", self.id, self.class, self.priority),
        }
    }
}

/// The work a task performs.
///
/// `setup` runs once on the first cycle after admission; `run` runs
/// each time the task is dispatched. Returning
/// [`TaskResponse::Terminate`] from either retires the task for good.
pub trait Routine {
    fn setup(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        TaskResponse::Continue
    }

    fn run(&mut self, now: Micros, info: &TaskInfo) -> TaskResponse;
}

/// Routine that does nothing and never terminates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Noop;

impl Routine for Noop {
    fn run(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        TaskResponse::Continue
    }
}

type NoSetup = fn(Micros, &TaskInfo) -> TaskResponse;

fn no_setup(_now: Micros, _info: &TaskInfo) -> TaskResponse {
    TaskResponse::Continue
}

/// Routine built from a pair of closures.
pub struct FnRoutine<S, L> {
    setup: S,
    run: L,
}

/// Wrap a loop closure as a routine with an empty setup.
pub fn from_fn<L>(run: L) -> FnRoutine<NoSetup, L>
where
    L: FnMut(Micros, &TaskInfo) -> TaskResponse,
{
    FnRoutine {
        setup: no_setup,
        run,
    }
}

impl<S, L> FnRoutine<S, L> {
    pub fn with_setup<S2>(self, setup: S2) -> FnRoutine<S2, L>
    where
        S2: FnMut(Micros, &TaskInfo) -> TaskResponse,
    {
        FnRoutine {
            setup,
            run: self.run,
        }
    }
}

impl<S, L> Routine for FnRoutine<S, L>
where
    S: FnMut(Micros, &TaskInfo) -> TaskResponse,
    L: FnMut(Micros, &TaskInfo) -> TaskResponse,
{
    fn setup(&mut self, now: Micros, info: &TaskInfo) -> TaskResponse {
        (self.setup)(now, info)
    }

    fn run(&mut self, now: Micros, info: &TaskInfo) -> TaskResponse {
        (self.run)(now, info)
    }
}

/// A schedulable unit: timing record plus a borrowed routine.
pub struct Task<'r> {
    pub(crate) info: TaskInfo,
    pub(crate) routine: &'r mut dyn Routine,
}

impl<'r> Task<'r> {
    pub fn interval(routine: &'r mut dyn Routine, execution_interval_micros: Micros) -> Self {
        Self {
            info: TaskInfo::new(TaskClass::Interval, execution_interval_micros),
            routine,
        }
    }

    pub fn idle(routine: &'r mut dyn Routine) -> Self {
        Self {
            info: TaskInfo::new(TaskClass::Idle, 0),
            routine,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.info.priority = priority;
        self
    }

    pub fn info(&self) -> &TaskInfo {
        &self.info
    }
}

impl fmt::Debug for Task<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("info", &self.info).finish_non_exhaustive()
    }
}
