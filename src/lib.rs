//! Footfall library
//!
//! Occupancy telemetry from a video stream: per-frame detection feeds a
//! tracking engine, track trajectories are tested against configured
//! boundary lines, and directional crossings accumulate into an append-only
//! event log queried for daily entry/exit/occupancy statistics.
//!
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
