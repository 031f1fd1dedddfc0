//! Core data types for the counting pipeline
//!
//! Geometry primitives, detections, tracks, boundary lines and crossing
//! events. Tracks are owned and mutated exclusively by the tracking engine;
//! everything else is immutable once produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

use super::error::PipelineError;

/// Newtype wrapper for track IDs to provide type safety
///
/// Track IDs are allocated from a monotonic counter and are never reused
/// for the lifetime of the process, including across counter resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for boundary line IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LineId(pub u32);

impl std::fmt::Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 2D point in frame coordinates (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D velocity vector in pixels per second
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned bounding box (top-left origin)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.w.is_finite() && self.h.is_finite()
    }

    /// Intersection-over-union with another box, 0.0 when disjoint
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

/// A single detection produced by the detection provider for one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub timestamp: DateTime<Utc>,
    pub bbox: BBox,
    pub confidence: f32,
    pub class: String,
}

impl Detection {
    pub fn new(timestamp: DateTime<Utc>, bbox: BBox, confidence: f32) -> Self {
        Self { timestamp, bbox, confidence, class: "person".to_string() }
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}

/// Logical flow direction a boundary line counts as an entry
///
/// The direction names the side of movement that increments the entry
/// counter; movement across the same segment the other way counts as exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDirection {
    LeftToRight,
    RightToLeft,
    TopToBottom,
    BottomToTop,
}

impl LineDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineDirection::LeftToRight => "left_to_right",
            LineDirection::RightToLeft => "right_to_left",
            LineDirection::TopToBottom => "top_to_bottom",
            LineDirection::BottomToTop => "bottom_to_top",
        }
    }
}

/// A configured virtual boundary segment whose crossings are counted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryLine {
    pub id: LineId,
    pub name: String,
    pub start: Point,
    pub end: Point,
    pub direction: LineDirection,
    pub active: bool,
    pub camera_id: Option<String>,
}

impl BoundaryLine {
    /// Check geometry and naming constraints before the line is stored
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::InvalidLine("name must not be empty".into()));
        }
        if !self.start.is_finite() || !self.end.is_finite() {
            return Err(PipelineError::InvalidLine("endpoints must be finite".into()));
        }
        Ok(())
    }
}

/// Directional classification of a crossing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Entry,
    Exit,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Entry => "entry",
            Flow::Exit => "exit",
        }
    }
}

/// An immutable record of a track crossing a boundary line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub flow: Flow,
    pub track_id: TrackId,
    pub position: Point,
    pub line_id: LineId,
    pub line_name: String,
    pub camera_id: Option<String>,
    pub confidence: f32,
}

/// Track lifecycle status
///
/// `Lost` is an intermediate signal, not terminal: a track returns to
/// `Active` on any successful match and leaves the live set only once its
/// miss counter exceeds the configured bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Active,
    Lost,
}

/// A persistent identity for a detected subject across ticks
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub id: TrackId,
    pub bbox: BBox,
    pub velocity: Vec2,
    pub confidence: f32,
    pub status: TrackStatus,
    pub misses: u32,
    pub first_seen: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Center-point history, strictly time-ordered, bounded by the tracker
    pub history: VecDeque<(Point, DateTime<Utc>)>,
}

impl Track {
    /// Spawn a fresh track from an unmatched detection
    pub fn spawn(id: TrackId, detection: &Detection, now: DateTime<Utc>) -> Self {
        let mut history = VecDeque::new();
        history.push_back((detection.center(), now));
        Self {
            id,
            bbox: detection.bbox,
            velocity: Vec2::default(),
            confidence: detection.confidence,
            status: TrackStatus::Active,
            misses: 0,
            first_seen: now,
            last_update: now,
            history,
        }
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.bbox.center()
    }

    /// Center position extrapolated from the last update by the current velocity
    pub fn predict(&self, elapsed_secs: f32) -> Point {
        let c = self.center();
        Point::new(c.x + self.velocity.x * elapsed_secs, c.y + self.velocity.y * elapsed_secs)
    }

    /// Fold a matched detection into the track
    ///
    /// Velocity is recomputed from the displacement since the most recent
    /// history point; a non-positive elapsed time leaves it unchanged.
    pub fn apply_detection(
        &mut self,
        detection: &Detection,
        now: DateTime<Utc>,
        history_cap: usize,
    ) {
        let new_center = detection.center();

        if let Some(&(last_point, last_ts)) = self.history.back() {
            let elapsed_secs = (now - last_ts).num_milliseconds() as f32 / 1000.0;
            if elapsed_secs > 0.0 {
                self.velocity = Vec2 {
                    x: (new_center.x - last_point.x) / elapsed_secs,
                    y: (new_center.y - last_point.y) / elapsed_secs,
                };
            }
        }

        self.bbox = detection.bbox;
        self.confidence = detection.confidence;
        self.last_update = now;
        self.misses = 0;
        self.status = TrackStatus::Active;

        self.history.push_back((new_center, now));
        while self.history.len() > history_cap {
            self.history.pop_front();
        }
    }

    /// Record a tick without a matching detection
    ///
    /// Position is left unchanged; the status flips to `Lost` once the miss
    /// counter passes `lost_after`.
    pub fn record_miss(&mut self, lost_after: u32) {
        self.misses += 1;
        if self.misses > lost_after {
            self.status = TrackStatus::Lost;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32, w: f32, h: f32) -> Detection {
        Detection::new(Utc::now(), BBox::new(x, y, w, h), 0.9)
    }

    #[test]
    fn test_iou_identical_boxes() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        let b = BBox::new(12.0, 12.0, 20.0, 20.0);
        // intersection 18x18 = 324, union 800 - 324 = 476
        let expected = 324.0 / 476.0;
        assert!((a.iou(&b) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_track_history_is_bounded() {
        let mut track = Track::spawn(TrackId(1), &det(0.0, 0.0, 10.0, 10.0), Utc::now());
        for i in 0..50 {
            let ts = Utc::now() + chrono::Duration::milliseconds(33 * (i + 1));
            track.apply_detection(&det(i as f32, 0.0, 10.0, 10.0), ts, 30);
        }
        assert_eq!(track.history.len(), 30);
    }

    #[test]
    fn test_velocity_unchanged_on_non_positive_elapsed() {
        let now = Utc::now();
        let mut track = Track::spawn(TrackId(1), &det(0.0, 0.0, 10.0, 10.0), now);
        track.velocity = Vec2 { x: 3.0, y: -2.0 };
        // same timestamp: elapsed is zero, velocity must be preserved
        track.apply_detection(&det(100.0, 100.0, 10.0, 10.0), now, 30);
        assert_eq!(track.velocity, Vec2 { x: 3.0, y: -2.0 });
    }

    #[test]
    fn test_velocity_from_displacement() {
        let now = Utc::now();
        let mut track = Track::spawn(TrackId(1), &det(0.0, 0.0, 10.0, 10.0), now);
        // center moves from (5,5) to (15,5) in 500ms -> 20 px/s along x
        track.apply_detection(
            &det(10.0, 0.0, 10.0, 10.0),
            now + chrono::Duration::milliseconds(500),
            30,
        );
        assert!((track.velocity.x - 20.0).abs() < 1e-3);
        assert!(track.velocity.y.abs() < 1e-3);
    }

    #[test]
    fn test_miss_flips_status_after_threshold() {
        let mut track = Track::spawn(TrackId(1), &det(0.0, 0.0, 10.0, 10.0), Utc::now());
        for _ in 0..5 {
            track.record_miss(5);
        }
        assert_eq!(track.status, TrackStatus::Active);
        track.record_miss(5);
        assert_eq!(track.status, TrackStatus::Lost);
    }

    #[test]
    fn test_boundary_line_validation() {
        let mut line = BoundaryLine {
            id: LineId(1),
            name: "entrance".to_string(),
            start: Point::new(0.0, 100.0),
            end: Point::new(500.0, 100.0),
            direction: LineDirection::TopToBottom,
            active: true,
            camera_id: None,
        };
        assert!(line.validate().is_ok());

        line.name = "   ".to_string();
        assert!(line.validate().is_err());

        line.name = "entrance".to_string();
        line.end = Point::new(f32::NAN, 100.0);
        assert!(line.validate().is_err());
    }
}
