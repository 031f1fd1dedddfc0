//! Services - business logic and state management
//!
//! This module contains the core pipeline services:
//! - `tracker` - association/tracking engine for persistent identities
//! - `crossing` - boundary crossing detection and direction resolution
//! - `counter` - append-only event log and occupancy aggregation
//! - `pipeline` - frame orchestrator, lifecycle and tick loop

pub mod counter;
pub mod crossing;
pub mod pipeline;
pub mod tracker;

// Re-export commonly used types
pub use counter::CounterLog;
pub use crossing::CrossingDetector;
pub use pipeline::{Pipeline, RunState};
pub use tracker::{Tracker, TrackerConfig};
