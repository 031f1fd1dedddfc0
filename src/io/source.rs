//! Frame acquisition capability
//!
//! The camera/file decode stack is an external collaborator; the pipeline
//! consumes it through these traits. `ReplaySource` serves frame files from
//! a directory for deterministic runs, `SyntheticSource` produces stub
//! frames for simulation where detection is scripted anyway.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::info;

use crate::domain::error::PipelineError;

/// Factory for frame streams
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Acquire the stream; called once per pipeline start
    async fn open(&self) -> Result<Box<dyn FrameHandle>, PipelineError>;
}

/// An open frame stream
#[async_trait]
pub trait FrameHandle: Send {
    /// Read the next frame; `Ok(None)` is an empty read, not an error
    async fn read_frame(&mut self) -> Result<Option<Bytes>, PipelineError>;
}

/// Replays frame files from a directory in lexicographic order
pub struct ReplaySource {
    dir: PathBuf,
    loop_frames: bool,
}

impl ReplaySource {
    pub fn new(dir: impl Into<PathBuf>, loop_frames: bool) -> Self {
        Self { dir: dir.into(), loop_frames }
    }
}

#[async_trait]
impl FrameSource for ReplaySource {
    async fn open(&self) -> Result<Box<dyn FrameHandle>, PipelineError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| PipelineError::Source(format!("{}: {e}", self.dir.display())))?;

        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::Source(e.to_string()))?
        {
            let path = entry.path();
            if path.is_file() {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(PipelineError::Source(format!(
                "no frame files in {}",
                self.dir.display()
            )));
        }

        info!(dir = %self.dir.display(), frames = frames.len(), "replay_source_opened");
        Ok(Box::new(ReplayHandle { frames, index: 0, loop_frames: self.loop_frames }))
    }
}

struct ReplayHandle {
    frames: Vec<PathBuf>,
    index: usize,
    loop_frames: bool,
}

#[async_trait]
impl FrameHandle for ReplayHandle {
    async fn read_frame(&mut self) -> Result<Option<Bytes>, PipelineError> {
        if self.index >= self.frames.len() {
            if !self.loop_frames {
                return Ok(None);
            }
            self.index = 0;
        }

        let path = &self.frames[self.index];
        self.index += 1;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::Source(format!("{}: {e}", path.display())))?;
        Ok(Some(Bytes::from(data)))
    }
}

/// Endless source of small stub frames
///
/// The payload carries only a frame counter; scripted detection providers
/// never look at pixel data.
pub struct SyntheticSource;

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn open(&self) -> Result<Box<dyn FrameHandle>, PipelineError> {
        info!("synthetic_source_opened");
        Ok(Box::new(SyntheticHandle { counter: 0 }))
    }
}

struct SyntheticHandle {
    counter: u64,
}

#[async_trait]
impl FrameHandle for SyntheticHandle {
    async fn read_frame(&mut self) -> Result<Option<Bytes>, PipelineError> {
        self.counter += 1;
        Ok(Some(Bytes::from(format!("synthetic-frame-{}", self.counter))))
    }
}
