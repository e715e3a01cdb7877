use core::cell::Cell;

use ht_sched::{
    CpuAccounting, Noop, Scheduler, Task, TaskResponse, TaskState, UtilizationMonitor, from_fn,
};

const SECOND: u32 = 1_000_000;

fn counting(counter: &Cell<u32>) -> impl FnMut(u32, &ht_sched::TaskInfo) -> TaskResponse + '_ {
    move |_, _| {
        counter.set(counter.get() + 1);
        TaskResponse::Continue
    }
}

#[test]
fn one_second_at_fixed_steps() {
    let clock = Cell::new(0u32);
    let acc = CpuAccounting::new();
    let (runs_a, runs_b, runs_c) = (Cell::new(0), Cell::new(0), Cell::new(0));
    let mut ra = from_fn(counting(&runs_a));
    let mut rb = from_fn(counting(&runs_b));
    let mut rc = from_fn(counting(&runs_c));
    let mut a = Task::interval(&mut ra, 20_000).with_priority(2);
    let mut b = Task::interval(&mut rb, 20_000).with_priority(1);
    let mut c = Task::idle(&mut rc).with_priority(0);

    let mut sched: Scheduler<'_, '_, _, 4> = Scheduler::new(|| clock.get(), &acc);
    let id_a = sched.schedule(&mut a).unwrap();
    let id_b = sched.schedule(&mut b).unwrap();
    let id_c = sched.schedule(&mut c).unwrap();

    let mut cycles = 0;
    while clock.get() <= SECOND {
        sched.run();
        cycles += 1;
        clock.set(clock.get() + 1000);
    }
    assert_eq!(cycles, 1001);

    assert_eq!(runs_a.get(), 50);
    assert_eq!(runs_b.get(), 50);
    // zero-cost loops leave slack in every cycle after setup
    assert_eq!(runs_c.get(), cycles - 1);

    let a = sched.task(id_a).unwrap();
    let b = sched.task(id_b).unwrap();
    assert_eq!(a.executions(), 51);
    assert_eq!(b.executions(), 51);
    assert_eq!(a.next_execution_micros(), SECOND);
    assert_eq!(b.next_execution_micros(), SECOND);
    assert_eq!(sched.task(id_c).unwrap().state(), TaskState::Running);
}

#[test]
fn interval_releases_do_not_drift_with_jitter() {
    const PERIOD: u32 = 20_000;
    let clock = Cell::new(0u32);
    let acc = CpuAccounting::new();
    let calls = Cell::new(0u32);
    let max_lateness = Cell::new(0u32);
    let mut r = from_fn(|now, info| {
        calls.set(calls.get() + 1);
        // `next` still holds the previous release while the loop runs
        let release = info.next_execution_micros() + info.execution_interval_micros();
        assert_eq!(release, calls.get() * PERIOD);
        max_lateness.set(max_lateness.get().max(now - release));
        TaskResponse::Continue
    });
    let mut t = Task::interval(&mut r, PERIOD);

    let mut sched: Scheduler<'_, '_, _, 1> = Scheduler::new(|| clock.get(), &acc);
    let id = sched.schedule(&mut t).unwrap();

    let steps = [700u32, 1300, 2900, 150, 4100, 60, 999];
    let mut i = 0;
    // stop after the release at SECOND is served but before the next one
    while clock.get() <= SECOND + 5000 {
        sched.run();
        clock.set(clock.get() + steps[i % steps.len()]);
        i += 1;
    }

    assert_eq!(calls.get(), 50);
    assert!(max_lateness.get() < 4100);
    assert_eq!(sched.task(id).unwrap().next_execution_micros(), 50 * PERIOD);
}

#[test]
fn interval_cadence_survives_counter_wrap() {
    let start = u32::MAX - 50_000;
    let clock = Cell::new(start);
    let acc = CpuAccounting::new();
    let runs = Cell::new(0u32);
    let mut r = from_fn(counting(&runs));
    let mut t = Task::interval(&mut r, 20_000);

    let mut sched: Scheduler<'_, '_, _, 1> = Scheduler::new(|| clock.get(), &acc);
    let id = sched.schedule(&mut t).unwrap();
    for _ in 0..200 {
        sched.run();
        clock.set(clock.get().wrapping_add(1000));
    }

    assert_eq!(runs.get(), 9);
    assert_eq!(
        sched.task(id).unwrap().next_execution_micros(),
        start.wrapping_add(9 * 20_000)
    );
}

#[test]
fn idle_task_only_runs_when_estimate_fits() {
    const PERIOD: u32 = 10_000;
    const IDLE_COST: u32 = 4500;
    let clock = Cell::new(0u32);
    let acc = CpuAccounting::new();
    let deadline = Cell::new(0u32);
    let idle_runs = Cell::new(0u32);

    let mut periodic = from_fn(|_, info| {
        deadline.set(info.next_execution_micros() + 2 * info.execution_interval_micros());
        TaskResponse::Continue
    })
    .with_setup(|now, info| {
        deadline.set(now + info.execution_interval_micros());
        TaskResponse::Continue
    });
    let mut idle = from_fn(|_, info| {
        let current = clock.get();
        assert!(
            info.execution_estimate_micros() + current < deadline.get(),
            "idle ran at {current} with estimate {} before deadline {}",
            info.execution_estimate_micros(),
            deadline.get()
        );
        idle_runs.set(idle_runs.get() + 1);
        clock.set(current + IDLE_COST);
        TaskResponse::Continue
    });
    let mut p = Task::interval(&mut periodic, PERIOD);
    let mut i = Task::idle(&mut idle);

    let mut sched: Scheduler<'_, '_, _, 2> = Scheduler::new(|| clock.get(), &acc);
    sched.schedule(&mut i).unwrap();
    let id_p = sched.schedule(&mut p).unwrap();

    let mut cycles = 0u32;
    while clock.get() <= SECOND {
        sched.run();
        cycles += 1;
        clock.set(clock.get() + 1000);
    }

    assert!(idle_runs.get() > 0);
    assert!(idle_runs.get() < cycles - 1, "idle task was never held back");
    assert_eq!(acc.totals().idle, (idle_runs.get() * IDLE_COST) as u64);
    assert!(sched.task(id_p).unwrap().executions() > 1);
}

#[test]
fn idle_task_without_interval_tasks_always_fits() {
    let clock = Cell::new(0u32);
    let acc = CpuAccounting::new();
    let runs = Cell::new(0u32);
    let mut r = from_fn(|_, _| {
        runs.set(runs.get() + 1);
        clock.set(clock.get() + 1_000_000);
        TaskResponse::Continue
    });
    let mut t = Task::idle(&mut r);

    let mut sched: Scheduler<'_, '_, _, 1> = Scheduler::new(|| clock.get(), &acc);
    sched.schedule(&mut t).unwrap();
    for _ in 0..6 {
        sched.run();
    }
    assert_eq!(runs.get(), 5);
    assert_eq!(sched.time_of_next_exec(), None);
}

#[test]
fn terminated_tasks_never_run_again() {
    let clock = Cell::new(0u32);
    let acc = CpuAccounting::new();
    let interval_runs = Cell::new(0u32);
    let idle_runs = Cell::new(0u32);
    let mut ri = from_fn(|_, _| {
        interval_runs.set(interval_runs.get() + 1);
        TaskResponse::from(interval_runs.get() < 3)
    });
    let mut rd = from_fn(|_, _| {
        idle_runs.set(idle_runs.get() + 1);
        (idle_runs.get() < 5).into()
    });
    let mut noop = Noop;
    let mut ti = Task::interval(&mut ri, 2000);
    let mut td = Task::idle(&mut rd);
    let mut survivor = Task::interval(&mut noop, 2000).with_priority(9);

    let mut sched: Scheduler<'_, '_, _, 3> = Scheduler::new(|| clock.get(), &acc);
    let id_i = sched.schedule(&mut ti).unwrap();
    let id_d = sched.schedule(&mut td).unwrap();
    let id_s = sched.schedule(&mut survivor).unwrap();

    for _ in 0..10_000 {
        sched.run();
        clock.set(clock.get().wrapping_add(1000));
    }

    assert_eq!(interval_runs.get(), 3);
    assert_eq!(idle_runs.get(), 5);
    let i = sched.task(id_i).unwrap();
    let d = sched.task(id_d).unwrap();
    assert_eq!((i.state(), i.executions()), (TaskState::Killed, 4));
    assert_eq!((d.state(), d.executions()), (TaskState::Killed, 6));
    assert_eq!(sched.task(id_s).unwrap().state(), TaskState::Running);
}

#[test]
fn monitor_fractions_partition_measured_time() {
    let clock = Cell::new(0u32);
    // every read costs a microsecond so the dispatch loop bills overhead
    let ticking = || {
        clock.set(clock.get().wrapping_add(1));
        clock.get()
    };
    let acc = CpuAccounting::new();
    let mut work = from_fn(|_, _| {
        clock.set(clock.get() + 300);
        TaskResponse::Continue
    });
    let mut background = from_fn(|_, _| {
        clock.set(clock.get() + 200);
        TaskResponse::Continue
    });
    let mut monitor = UtilizationMonitor::new(&acc);
    let mut w = Task::interval(&mut work, 5000).with_priority(1);
    let mut bg = Task::idle(&mut background);
    let mut mon = Task::interval(&mut monitor, 100_000).with_priority(0);

    let mut sched: Scheduler<'_, '_, _, 3> = Scheduler::new(ticking, &acc);
    sched.schedule(&mut w).unwrap();
    sched.schedule(&mut bg).unwrap();
    sched.schedule(&mut mon).unwrap();

    while clock.get() < SECOND {
        sched.run();
        clock.set(clock.get() + 500);
    }

    assert!(acc.samples() >= 5);
    let u = sched.utilization();
    assert!(u.periodic() > 0.0 && u.idle() > 0.0 && u.scheduler() > 0.0);
    assert!((u.periodic() + u.idle() + u.scheduler() - 1.0).abs() < 1e-4);
}
