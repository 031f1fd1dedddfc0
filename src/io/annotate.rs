//! Frame annotation capability
//!
//! Drawing boxes, track trails and boundary lines onto frames is an
//! external rendering concern; the pipeline only offers the seam. The
//! passthrough impl returns the frame unchanged, which keeps the
//! current-frame query working without a renderer.

use bytes::Bytes;

use crate::domain::types::{BoundaryLine, Detection, Track};

/// Capability interface for producing an annotated copy of a frame
pub trait FrameAnnotator: Send + Sync {
    fn annotate(
        &self,
        frame: &Bytes,
        detections: &[Detection],
        tracks: &[Track],
        lines: &[BoundaryLine],
    ) -> Bytes;
}

/// Annotator that returns the input frame unchanged
pub struct PassthroughAnnotator;

impl FrameAnnotator for PassthroughAnnotator {
    fn annotate(
        &self,
        frame: &Bytes,
        _detections: &[Detection],
        _tracks: &[Track],
        _lines: &[BoundaryLine],
    ) -> Bytes {
        frame.clone()
    }
}
