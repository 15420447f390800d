//! clock.rs
//! Monotonic millisecond clock driving every delay and settle period.
//!
//! - `TickingClock`: a dedicated high-priority thread advances the counter once per
//!   period (SpinSleeper pacing) and wakes any waiter. Nothing else is written by it.
//! - `ManualClock`: deterministic clock for tests and offline runs; delays advance
//!   time instantly.
//!
//! `delay_ms` blocks the calling control loop until the counter has advanced by N,
//! the same contract as the spin-until-timestamp delay, without burning the CPU.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use spin_sleep::{SpinSleeper, SpinStrategy};
use thread_priority::{ThreadBuilderExt, ThreadPriority};

use crate::utils::error::{ControlError, Result};

pub trait Clock: Send + Sync {
    /// Milliseconds since the clock started.
    fn now_ms(&self) -> u64;

    /// Block until the counter has advanced by `ms`.
    fn delay_ms(&self, ms: u64);
}

pub type SharedClock = Arc<dyn Clock>;

struct TickState {
    ticks: Mutex<u64>,
    tick: Condvar,
    late_ticks: AtomicU64,
}

/// Millisecond counter advanced by a background ticker thread.
pub struct TickingClock {
    state: Arc<TickState>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickingClock {
    /// Spawn the ticker. Fails only if the OS refuses the thread.
    pub fn start(period: Duration) -> Result<Self> {
        let state = Arc::new(TickState {
            ticks: Mutex::new(0),
            tick: Condvar::new(),
            late_ticks: AtomicU64::new(0),
        });
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let state = state.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("ms-ticker".to_string())
                .spawn_with_priority(ThreadPriority::Max, move |prio| {
                    if prio.is_err() {
                        debug!("[Clock] ticker running without elevated priority");
                    }
                    run_ticker(&state, &running, period);
                })
                .map_err(|e| ControlError::HardwareInit(format!("clock ticker: {e}")))?
        };

        info!("[Clock] ticker started, period {:?}", period);
        Ok(Self {
            state,
            running,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Ticks that fired after their scheduled release.
    pub fn late_ticks(&self) -> u64 {
        self.state.late_ticks.load(Ordering::Relaxed)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("[Clock] ticker thread panicked");
            }
        }
        self.state.tick.notify_all();
    }
}

fn run_ticker(state: &TickState, running: &AtomicBool, period: Duration) {
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let mut next_release = Instant::now() + period;

    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next_release {
            sleeper.sleep(next_release - now);
        } else {
            state.late_ticks.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut ticks = state.ticks.lock();
            *ticks += 1;
        }
        state.tick.notify_all();

        next_release += period;
    }
    debug!("[Clock] ticker stopped");
}

impl Clock for TickingClock {
    fn now_ms(&self) -> u64 {
        *self.state.ticks.lock()
    }

    fn delay_ms(&self, ms: u64) {
        if ms == 0 {
            return;
        }
        let mut ticks = self.state.ticks.lock();
        let target = *ticks + ms;
        while *ticks < target {
            self.state.tick.wait_for(&mut ticks, Duration::from_millis(ms.max(10)));
            if !self.running.load(Ordering::Acquire) {
                warn!("[Clock] delay abandoned, ticker is stopped");
                return;
            }
        }
    }
}

impl Drop for TickingClock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clock whose time only moves when told to; `delay_ms` advances it directly.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

// Pacing primitives, benchmarked against each other in benches/clock_bench.rs.

/// Sleep one period with the OS scheduler; returns the overshoot in µs.
pub fn thread_sleep_tick(period_us: u64, last: &mut Instant) -> i64 {
    thread::sleep(Duration::from_micros(period_us));
    let now = Instant::now();
    let actual = now.duration_since(*last).as_micros() as i64;
    *last = now;
    actual - period_us as i64
}

/// Sleep one period with the ticker's SpinSleeper; returns the overshoot in µs.
pub fn spin_sleep_tick(period_us: u64, sleeper: &SpinSleeper, last: &mut Instant) -> i64 {
    sleeper.sleep(Duration::from_micros(period_us));
    let now = Instant::now();
    let actual = now.duration_since(*last).as_micros() as i64;
    *last = now;
    actual - period_us as i64
}
