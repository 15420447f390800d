//! Event recording and run statistics.
//!
//! - **EventRecorder:** lock-free queue (16K capacity) drained by a background
//!   exporter thread into a CSV event log. The control loop only ever pushes.
//! - **Stats:** min/max/mean over a run's frequency samples, used in the run summary.
//!
//! Event trace per tick: sample acquired → actuator applied → (late tick).

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use crossbeam_queue::ArrayQueue;
use log::{debug, error, warn};

/// Per-run event. Timestamps are clock milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    RunStart {
        run: u64,
        ts_ms: u64,
        label: &'static str,
    },
    /// Frequency reading stored in the sample buffer.
    Sample {
        run: u64,
        index: usize,
        ts_ms: u64,
        freq_hz: u32,
    },
    /// Duty cycle written to the PWM actuator.
    Actuation {
        run: u64,
        index: usize,
        ts_ms: u64,
        duty: u8,
    },
    /// Iteration took longer than twice the sample period.
    LateTick {
        run: u64,
        index: usize,
        ts_ms: u64,
        elapsed_ms: u64,
    },
    RunEnd {
        run: u64,
        ts_ms: u64,
        samples: usize,
        late_ticks: u64,
    },
}

pub const EVENT_CSV_HEADER: &str = "run,event,ts_ms,index,value,extra";

impl Event {
    /// CSV row: run,event,ts_ms,index,value,extra
    pub fn to_csv_row(&self) -> String {
        match self {
            Event::RunStart { run, ts_ms, label } => {
                format!("{},RunStart,{},,,{}", run, ts_ms, label)
            }
            Event::Sample { run, index, ts_ms, freq_hz } => {
                format!("{},Sample,{},{},{},", run, ts_ms, index, freq_hz)
            }
            Event::Actuation { run, index, ts_ms, duty } => {
                format!("{},Actuation,{},{},{},", run, ts_ms, index, duty)
            }
            Event::LateTick { run, index, ts_ms, elapsed_ms } => {
                format!("{},LateTick,{},{},{},", run, ts_ms, index, elapsed_ms)
            }
            Event::RunEnd { run, ts_ms, samples, late_ticks } => {
                format!("{},RunEnd,{},,{},{}", run, ts_ms, samples, late_ticks)
            }
        }
    }
}

const EVENT_QUEUE_CAPACITY: usize = 16_384;

/// Non-blocking event recorder with an optional background CSV exporter.
///
/// `record()` never blocks; when the queue is full the event is dropped and
/// counted.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    dropped: AtomicU64,
    exporting: Arc<AtomicBool>,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            dropped: AtomicU64::new(0),
            exporting: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn record(&self, event: Event) {
        if self.queue.push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Pop everything currently queued. Used when no exporter is running.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::with_capacity(self.queue.len());
        while let Some(event) = self.queue.pop() {
            out.push(event);
        }
        out
    }

    /// Spawn a thread draining the queue into `output_csv` until `stop_exporter`
    /// is called and the queue is empty.
    pub fn start_exporter(&self, output_csv: PathBuf) -> thread::JoinHandle<()> {
        let queue = self.queue.clone();
        let exporting = self.exporting.clone();
        exporting.store(true, Ordering::Release);

        thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(file) => file,
                Err(e) => {
                    error!("[Events] failed to create {}: {}", output_csv.display(), e);
                    exporting.store(false, Ordering::Release);
                    return;
                }
            };
            let mut writer = BufWriter::new(file);
            if let Err(e) = writeln!(writer, "{}", EVENT_CSV_HEADER) {
                error!("[Events] failed to write header: {}", e);
                return;
            }

            let mut written = 0u64;
            loop {
                match queue.pop() {
                    Some(event) => {
                        if let Err(e) = writeln!(writer, "{}", event.to_csv_row()) {
                            error!("[Events] write failed: {}", e);
                            break;
                        }
                        written += 1;
                    }
                    None => {
                        if !exporting.load(Ordering::Acquire) && queue.is_empty() {
                            break;
                        }
                        if let Err(e) = writer.flush() {
                            warn!("[Events] flush failed: {}", e);
                            break;
                        }
                        thread::sleep(Duration::from_millis(10));
                    }
                }
            }

            if let Err(e) = writer.flush() {
                warn!("[Events] final flush failed: {}", e);
            }
            debug!("[Events] exporter finished, {} events written", written);
        })
    }

    /// Ask the exporter to finish once the queue is drained.
    pub fn stop_exporter(&self) {
        self.exporting.store(false, Ordering::Release);
    }
}

/// Summary of one sample series.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

pub fn calculate_stats(data: &[u32]) -> Option<Stats> {
    if data.is_empty() {
        return None;
    }

    let count = data.len();
    let min = data.iter().map(|&x| x as f64).fold(f64::INFINITY, f64::min);
    let max = data.iter().map(|&x| x as f64).fold(f64::NEG_INFINITY, f64::max);
    let mean = data.iter().map(|&x| x as f64).sum::<f64>() / count as f64;

    Some(Stats { min, max, mean, count })
}
