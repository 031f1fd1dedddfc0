//! Boundary line storage capability
//!
//! Durable CRUD lives outside the core; the pipeline fetches only the
//! current active-line list at tick time. The in-memory impl is the
//! default backing for the service and for tests.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::info;

use crate::domain::error::PipelineError;
use crate::domain::types::{BoundaryLine, LineId};

/// Capability interface for boundary line configuration
pub trait BoundaryStore: Send + Sync {
    /// Validate and store a line; the store assigns the id
    fn add(&self, line: BoundaryLine) -> Result<LineId, PipelineError>;
    /// Remove a line by id; unknown ids are a configuration error
    fn remove(&self, id: LineId) -> Result<(), PipelineError>;
    fn get(&self, id: LineId) -> Option<BoundaryLine>;
    /// Lines with the active flag set, as consumed by the crossing scan
    fn active(&self) -> Vec<BoundaryLine>;
    fn all(&self) -> Vec<BoundaryLine>;
}

/// RwLock-guarded in-memory line store
pub struct MemoryStore {
    lines: RwLock<Vec<BoundaryLine>>,
    next_id: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { lines: RwLock::new(Vec::new()), next_id: AtomicU32::new(1) }
    }

    /// Seed the store with pre-configured lines, keeping their ids
    ///
    /// Invalid seed lines are rejected as a whole so a bad config file
    /// surfaces at startup rather than as silently missing lines.
    pub fn with_lines(seed: Vec<BoundaryLine>) -> Result<Self, PipelineError> {
        for line in &seed {
            line.validate()?;
        }
        let next = seed.iter().map(|l| l.id.0).max().unwrap_or(0) + 1;
        Ok(Self { lines: RwLock::new(seed), next_id: AtomicU32::new(next) })
    }
}

impl BoundaryStore for MemoryStore {
    fn add(&self, mut line: BoundaryLine) -> Result<LineId, PipelineError> {
        line.validate()?;
        let id = LineId(self.next_id.fetch_add(1, Ordering::Relaxed));
        line.id = id;
        info!(line_id = %id, name = %line.name, direction = %line.direction.as_str(), "line_added");
        self.lines.write().push(line);
        Ok(id)
    }

    fn remove(&self, id: LineId) -> Result<(), PipelineError> {
        let mut lines = self.lines.write();
        let before = lines.len();
        lines.retain(|l| l.id != id);
        if lines.len() == before {
            return Err(PipelineError::UnknownLine(id));
        }
        info!(line_id = %id, "line_removed");
        Ok(())
    }

    fn get(&self, id: LineId) -> Option<BoundaryLine> {
        self.lines.read().iter().find(|l| l.id == id).cloned()
    }

    fn active(&self) -> Vec<BoundaryLine> {
        self.lines.read().iter().filter(|l| l.active).cloned().collect()
    }

    fn all(&self) -> Vec<BoundaryLine> {
        self.lines.read().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
