//! Aggregate statistics types
//!
//! Daily counter snapshots are pure functions of the event log and a query
//! range; they are computed on demand and never persisted incrementally.

use chrono::NaiveDate;
use serde::Serialize;

/// Entry/exit totals for a single hour of a day
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HourlyStats {
    pub hour: u32,
    pub entries: u32,
    pub exits: u32,
}

impl HourlyStats {
    pub fn balance(&self) -> i64 {
        self.entries as i64 - self.exits as i64
    }
}

/// Counter aggregates for one calendar day, derived from the event log
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub date: NaiveDate,
    pub total_entries: u32,
    pub total_exits: u32,
    /// Highest clamped running balance observed over the day
    pub peak_occupancy: u32,
    /// One bucket per hour, index 0..24
    pub hourly: Vec<HourlyStats>,
}

impl CounterSnapshot {
    /// Raw balance: entries minus exits, may be negative
    pub fn balance(&self) -> i64 {
        self.total_entries as i64 - self.total_exits as i64
    }

    /// Live occupancy estimate: balance clamped to zero
    pub fn current_occupancy(&self) -> u32 {
        self.balance().max(0) as u32
    }
}

/// Rolling statistics for the orchestrator loop
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Current lifecycle state, e.g. "running"
    pub state: String,
    pub frames_processed: u64,
    pub total_detections: u64,
    pub total_events: u64,
    pub active_tracks: usize,
    /// Average per-tick processing time over the bounded sample window
    pub avg_tick_ms: f64,
    /// Frames processed divided by wall-clock seconds since start
    pub fps: f64,
    pub uptime_secs: u64,
}
