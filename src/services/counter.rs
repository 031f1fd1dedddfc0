//! Counting service - the append-only crossing event log
//!
//! Snapshots are derived from the raw log on every query rather than kept as
//! incremental counters; at foot-traffic volumes the recompute is cheap and
//! the log stays the single source of truth. Synchronization is the owner's
//! job: the orchestrator holds the log behind its core lock, giving one
//! logical writer.

use chrono::{NaiveDate, Timelike};
use tracing::debug;

use crate::domain::stats::{CounterSnapshot, HourlyStats};
use crate::domain::types::{CrossingEvent, Flow};

/// Append-only log of crossing events with on-demand aggregation
pub struct CounterLog {
    events: Vec<CrossingEvent>,
}

impl CounterLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append events as produced by the crossing detector
    ///
    /// Upstream timestamps are trusted; no validation beyond what the event
    /// type itself guarantees.
    pub fn record(&mut self, events: Vec<CrossingEvent>) {
        if events.is_empty() {
            return;
        }
        debug!(count = events.len(), total = self.events.len() + events.len(), "events_recorded");
        self.events.extend(events);
    }

    pub fn events(&self) -> &[CrossingEvent] {
        &self.events
    }

    pub fn events_for_date(&self, date: NaiveDate) -> Vec<CrossingEvent> {
        self.events.iter().filter(|e| e.timestamp.date_naive() == date).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Aggregate one calendar day of the log into a snapshot
    pub fn stats_for_date(&self, date: NaiveDate) -> CounterSnapshot {
        let mut day_events: Vec<&CrossingEvent> =
            self.events.iter().filter(|e| e.timestamp.date_naive() == date).collect();
        day_events.sort_by_key(|e| e.timestamp);

        let mut hourly: Vec<HourlyStats> =
            (0..24).map(|hour| HourlyStats { hour, entries: 0, exits: 0 }).collect();
        let mut total_entries = 0u32;
        let mut total_exits = 0u32;
        let mut running: i64 = 0;
        let mut peak: i64 = 0;

        for event in day_events {
            let hour = event.timestamp.hour() as usize;
            match event.flow {
                Flow::Entry => {
                    total_entries += 1;
                    hourly[hour].entries += 1;
                    running += 1;
                }
                Flow::Exit => {
                    total_exits += 1;
                    hourly[hour].exits += 1;
                    running -= 1;
                }
            }
            // peak tracks the clamped running balance over the day
            peak = peak.max(running.max(0));
        }

        CounterSnapshot {
            date,
            total_entries,
            total_exits,
            peak_occupancy: peak as u32,
            hourly,
        }
    }

    /// One snapshot per calendar day, inclusive on both ends
    ///
    /// An inverted range yields an empty list.
    pub fn stats_for_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<CounterSnapshot> {
        let mut snapshots = Vec::new();
        let mut date = start;
        while date <= end {
            snapshots.push(self.stats_for_date(date));
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        snapshots
    }

    /// Current occupancy for a date: balance clamped to zero
    pub fn current_occupancy(&self, date: NaiveDate) -> u32 {
        self.stats_for_date(date).current_occupancy()
    }

    /// Clear the log back to the empty initial state
    pub fn reset(&mut self) {
        debug!(dropped = self.events.len(), "event_log_reset");
        self.events.clear();
    }
}

impl Default for CounterLog {
    fn default() -> Self {
        Self::new()
    }
}
