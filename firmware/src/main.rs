// ht-sched demo firmware for the ESP32-C3
//
// Boot sequence: logger -> hal -> tasks -> enter the cycle loop
// Main loop: one scheduler cycle per iteration, forever.
//
// Interval tasks (highest first):
//   schedmon   1 s     closes the utilization window
//   control    20 ms   simulated 1.5 ms control loop
//   heartbeat  500 ms  logs a beat
//   report     1 s     logs the latest utilization
// Idle tasks:
//   housekeeping  short busy spin, only in slack before the next deadline
//
// Time source is the esp-hal system timer truncated to u32 micros.

#![no_std]
#![no_main]

use esp_backtrace as _;
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::time::Instant;
use log::info;
use static_cell::StaticCell;

use ht_sched::{
    CpuAccounting, MAX_TASKS, Micros, Routine, Scheduler, Task, TaskInfo, TaskResponse,
    UtilizationMonitor,
};

esp_bootloader_esp_idf::esp_app_desc!();

const CONTROL_INTERVAL_US: Micros = 20_000;
const CONTROL_BUSY_US: u32 = 1_500;
const HEARTBEAT_INTERVAL_US: Micros = 500_000;
const REPORT_INTERVAL_US: Micros = 1_000_000;
const SCHEDMON_INTERVAL_US: Micros = 1_000_000;
const HOUSEKEEPING_BUSY_US: u32 = 200;

static ACCOUNTING: StaticCell<CpuAccounting> = StaticCell::new();

fn micros() -> Micros {
    Instant::now().duration_since_epoch().as_micros() as Micros
}

struct Heartbeat {
    beats: u32,
}

impl Routine for Heartbeat {
    fn run(&mut self, now: Micros, info: &TaskInfo) -> TaskResponse {
        self.beats = self.beats.wrapping_add(1);
        info!("heartbeat {} at {}us (exec {})", self.beats, now, info.executions());
        TaskResponse::Continue
    }
}

// stands in for real work with a fixed busy wait
struct Busy {
    delay: Delay,
    busy_us: u32,
}

impl Routine for Busy {
    fn run(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        self.delay.delay_micros(self.busy_us);
        TaskResponse::Continue
    }
}

struct Report<'a> {
    accounting: &'a CpuAccounting,
}

impl Routine for Report<'_> {
    fn setup(&mut self, now: Micros, _info: &TaskInfo) -> TaskResponse {
        info!("report: first sample due {}us after {}", REPORT_INTERVAL_US, now);
        TaskResponse::Continue
    }

    fn run(&mut self, _now: Micros, _info: &TaskInfo) -> TaskResponse {
        info!(
            "report: {} ({} windows)",
            self.accounting.utilization(),
            self.accounting.samples()
        );
        TaskResponse::Continue
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let _peripherals = esp_hal::init(config);

    info!("booting...");

    let accounting: &'static CpuAccounting = ACCOUNTING.init(CpuAccounting::new());

    let mut monitor = UtilizationMonitor::new(accounting);
    let mut control = Busy {
        delay: Delay::new(),
        busy_us: CONTROL_BUSY_US,
    };
    let mut heartbeat = Heartbeat { beats: 0 };
    let mut report = Report { accounting };
    let mut housekeeping = Busy {
        delay: Delay::new(),
        busy_us: HOUSEKEEPING_BUSY_US,
    };

    let mut schedmon_task = Task::interval(&mut monitor, SCHEDMON_INTERVAL_US).with_priority(0);
    let mut control_task = Task::interval(&mut control, CONTROL_INTERVAL_US).with_priority(1);
    let mut heartbeat_task = Task::interval(&mut heartbeat, HEARTBEAT_INTERVAL_US).with_priority(2);
    let mut report_task = Task::interval(&mut report, REPORT_INTERVAL_US).with_priority(3);
    let mut housekeeping_task = Task::idle(&mut housekeeping);

    let mut sched: Scheduler<'_, '_, _, MAX_TASKS> = Scheduler::new(micros, accounting);
    for task in [
        &mut housekeeping_task,
        &mut report_task,
        &mut heartbeat_task,
        &mut control_task,
        &mut schedmon_task,
    ] {
        if let Err(e) = sched.schedule(task) {
            info!("boot: skipping, {}", e);
        }
    }
    info!("scheduler ready: {} of {} slots, {}", sched.len(), sched.capacity(), sched.config());

    loop {
        sched.run();
    }
}
