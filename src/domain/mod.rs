//! Domain models - core business types for the counting pipeline
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - geometry, detections, tracks, boundary lines, crossing events
//! - `stats` - daily counter snapshots and pipeline statistics
//! - `error` - the pipeline error taxonomy

pub mod error;
pub mod stats;
pub mod types;

pub use error::PipelineError;
pub use stats::{CounterSnapshot, HourlyStats, PipelineStats};
pub use types::{
    BBox, BoundaryLine, CrossingEvent, Detection, Flow, LineDirection, LineId, Point, Track,
    TrackId, TrackStatus, Vec2,
};
