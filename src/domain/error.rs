//! Error taxonomy for the counting pipeline
//!
//! Nothing here is fatal to the host process: configuration and lifecycle
//! errors are returned to the caller, transient and processing errors are
//! logged inside the orchestrator loop which then continues.

use thiserror::Error;

use super::types::LineId;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Boundary line rejected before any state change
    #[error("invalid boundary line: {0}")]
    InvalidLine(String),

    /// Delete of a boundary line id that is not stored
    #[error("unknown boundary line {0}")]
    UnknownLine(LineId),

    /// `start()` while the pipeline is already running
    #[error("pipeline is already running")]
    AlreadyRunning,

    /// `stop()` while the pipeline is stopped
    #[error("pipeline is not running")]
    NotRunning,

    /// Frame source failed to open or read
    #[error("frame source error: {0}")]
    Source(String),

    /// Detection provider failed for a frame
    #[error("detection provider error: {0}")]
    Detector(String),
}
