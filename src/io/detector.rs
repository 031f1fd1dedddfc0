//! Detection provider capability
//!
//! The object-detection model is an external collaborator consumed through
//! `DetectionProvider`. `NullProvider` is the wiring default when no model
//! integration is configured; `ScriptedProvider` replays a prepared
//! detection script for simulation and testing.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::domain::error::PipelineError;
use crate::domain::types::{BBox, Detection};

/// Capability interface: image bytes in, detections out
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    async fn detect(
        &self,
        frame: &Bytes,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, PipelineError>;
}

/// Provider that never detects anything
///
/// Used when the service runs without a model wired in; the pipeline still
/// exercises acquisition, cadence and statistics.
pub struct NullProvider;

#[async_trait]
impl DetectionProvider for NullProvider {
    async fn detect(
        &self,
        _frame: &Bytes,
        _confidence_threshold: f32,
    ) -> Result<Vec<Detection>, PipelineError> {
        Ok(Vec::new())
    }
}

/// Replays one prepared list of (box, confidence) pairs per call
///
/// Frame content is ignored. Once the script is exhausted every further
/// call yields an empty detection list.
pub struct ScriptedProvider {
    frames: Mutex<VecDeque<Vec<(BBox, f32)>>>,
}

impl ScriptedProvider {
    pub fn from_frames(frames: Vec<Vec<(BBox, f32)>>) -> Self {
        Self { frames: Mutex::new(frames.into()) }
    }

    /// Number of scripted frames not yet served
    pub fn remaining(&self) -> usize {
        self.frames.lock().len()
    }
}

#[async_trait]
impl DetectionProvider for ScriptedProvider {
    async fn detect(
        &self,
        _frame: &Bytes,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, PipelineError> {
        let scripted = self.frames.lock().pop_front().unwrap_or_default();
        let now = Utc::now();
        Ok(scripted
            .into_iter()
            .filter(|&(_, confidence)| confidence >= confidence_threshold)
            .map(|(bbox, confidence)| Detection::new(now, bbox, confidence))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_provider_detects_nothing() {
        let detections =
            NullProvider.detect(&Bytes::from_static(b"frame"), 0.5).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn test_scripted_provider_serves_frames_in_order() {
        let provider = ScriptedProvider::from_frames(vec![
            vec![(BBox::new(10.0, 10.0, 20.0, 20.0), 0.9)],
            vec![],
            vec![(BBox::new(40.0, 10.0, 20.0, 20.0), 0.8)],
        ]);
        let frame = Bytes::from_static(b"frame");

        assert_eq!(provider.detect(&frame, 0.5).await.unwrap().len(), 1);
        assert!(provider.detect(&frame, 0.5).await.unwrap().is_empty());
        assert_eq!(provider.detect(&frame, 0.5).await.unwrap().len(), 1);
        // script exhausted
        assert!(provider.detect(&frame, 0.5).await.unwrap().is_empty());
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_scripted_provider_applies_threshold() {
        let provider = ScriptedProvider::from_frames(vec![vec![
            (BBox::new(10.0, 10.0, 20.0, 20.0), 0.9),
            (BBox::new(40.0, 10.0, 20.0, 20.0), 0.2),
        ]]);
        let detections =
            provider.detect(&Bytes::from_static(b"frame"), 0.5).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].confidence, 0.9);
    }
}
