//! Pipeline metrics collection
//!
//! Monotonic counters are atomics so the hot path never takes a lock for
//! them; the bounded latency window and start instant sit behind a small
//! mutex that only the loop (writer) and stats queries (readers) touch.
//!
//! NOTE: all atomics use Relaxed ordering intentionally - these are
//! statistical counters only, never used for coordination.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Number of per-tick latency samples kept for the rolling average
const LATENCY_WINDOW: usize = 100;

/// Rolling pipeline statistics
pub struct Metrics {
    /// Frames fully processed (monotonic)
    frames_total: AtomicU64,
    /// Detections seen across all processed frames (monotonic)
    detections_total: AtomicU64,
    /// Crossing events produced (monotonic)
    events_total: AtomicU64,
    /// Empty frame-source reads (monotonic)
    empty_reads_total: AtomicU64,
    /// Ticks that failed and were skipped after backoff (monotonic)
    tick_errors_total: AtomicU64,
    /// Wall-clock start of the current run
    started_at: Mutex<Option<Instant>>,
    /// Last `LATENCY_WINDOW` per-tick processing times in milliseconds
    tick_samples_ms: Mutex<VecDeque<f64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            frames_total: AtomicU64::new(0),
            detections_total: AtomicU64::new(0),
            events_total: AtomicU64::new(0),
            empty_reads_total: AtomicU64::new(0),
            tick_errors_total: AtomicU64::new(0),
            started_at: Mutex::new(None),
            tick_samples_ms: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
        }
    }

    /// Mark the wall-clock start of a run (fps baseline)
    pub fn mark_started(&self) {
        *self.started_at.lock() = Some(Instant::now());
    }

    /// Record one fully processed tick
    pub fn record_tick(&self, latency_ms: f64, detections: u64, events: u64) {
        self.frames_total.fetch_add(1, Ordering::Relaxed);
        self.detections_total.fetch_add(detections, Ordering::Relaxed);
        self.events_total.fetch_add(events, Ordering::Relaxed);

        let mut samples = self.tick_samples_ms.lock();
        if samples.len() == LATENCY_WINDOW {
            samples.pop_front();
        }
        samples.push_back(latency_ms);
    }

    pub fn record_empty_read(&self) {
        self.empty_reads_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_error(&self) {
        self.tick_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames_total.load(Ordering::Relaxed)
    }

    pub fn detections(&self) -> u64 {
        self.detections_total.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events_total.load(Ordering::Relaxed)
    }

    pub fn empty_reads(&self) -> u64 {
        self.empty_reads_total.load(Ordering::Relaxed)
    }

    pub fn tick_errors(&self) -> u64 {
        self.tick_errors_total.load(Ordering::Relaxed)
    }

    /// Average processing time over the bounded sample window
    pub fn avg_tick_ms(&self) -> f64 {
        let samples = self.tick_samples_ms.lock();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    /// Frames processed per wall-clock second since `mark_started`
    pub fn fps(&self) -> f64 {
        let started = self.started_at.lock();
        match *started {
            Some(at) => {
                let elapsed = at.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.frames() as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.lock().map(|at| at.elapsed().as_secs()).unwrap_or(0)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
