//! Boundary crossing detection
//!
//! Tests each track's movement segment (previous center to current center)
//! against every active boundary line and classifies crossings as entries or
//! exits. The previous position lives in a side map keyed by track id - a
//! weak reference only, pruned every scan to the live id set.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use tracing::debug;
use uuid::Uuid;

use crate::domain::types::{BoundaryLine, CrossingEvent, Flow, LineDirection, Point, Track, TrackId};

/// Segments closer to parallel than this determinant are treated as
/// non-intersecting.
const PARALLEL_EPSILON: f32 = 1e-10;

/// Parametric segment intersection test
///
/// Returns true when the segments `(a1, a2)` and `(b1, b2)` intersect with
/// both parameters in [0, 1].
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let denom = (a1.x - a2.x) * (b1.y - b2.y) - (a1.y - a2.y) * (b1.x - b2.x);
    if denom.abs() < PARALLEL_EPSILON {
        return false;
    }

    let t = ((a1.x - b1.x) * (b1.y - b2.y) - (a1.y - b1.y) * (b1.x - b2.x)) / denom;
    let u = -((a1.x - a2.x) * (a1.y - b1.y) - (a1.y - a2.y) * (a1.x - b1.x)) / denom;

    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

/// Classify a crossing by the sign of the 2D cross product of the boundary
/// vector and the movement vector
///
/// LeftToRight and TopToBottom map a positive cross product to Entry;
/// RightToLeft and BottomToTop invert the mapping. A zero cross product
/// (movement collinear with the boundary) yields no event.
pub fn crossing_flow(line: &BoundaryLine, from: Point, to: Point) -> Option<Flow> {
    let line_vec = (line.end.x - line.start.x, line.end.y - line.start.y);
    let movement = (to.x - from.x, to.y - from.y);
    let cross = line_vec.0 * movement.1 - line_vec.1 * movement.0;

    if cross == 0.0 {
        return None;
    }

    let positive_is_entry = matches!(
        line.direction,
        LineDirection::LeftToRight | LineDirection::TopToBottom
    );

    Some(if (cross > 0.0) == positive_is_entry { Flow::Entry } else { Flow::Exit })
}

/// Stateful scanner holding last-seen centers per live track
pub struct CrossingDetector {
    last_positions: FxHashMap<TrackId, Point>,
}

impl CrossingDetector {
    pub fn new() -> Self {
        Self { last_positions: FxHashMap::default() }
    }

    /// Scan one tick's track snapshot against the active boundary set
    ///
    /// Emits at most one event per (track, line) pair per tick; a track
    /// crossing several distinct lines yields one event each. Afterwards the
    /// side map is updated and pruned to the ids still live.
    pub fn scan(
        &mut self,
        tracks: &[Track],
        lines: &[BoundaryLine],
        now: DateTime<Utc>,
    ) -> Vec<CrossingEvent> {
        let mut events = Vec::new();

        for track in tracks {
            let current = track.center();

            if let Some(&previous) = self.last_positions.get(&track.id) {
                for line in lines.iter().filter(|l| l.active) {
                    if !segments_intersect(previous, current, line.start, line.end) {
                        continue;
                    }
                    let Some(flow) = crossing_flow(line, previous, current) else {
                        continue;
                    };

                    debug!(
                        track_id = %track.id,
                        line = %line.name,
                        flow = %flow.as_str(),
                        "boundary_crossed"
                    );

                    events.push(CrossingEvent {
                        id: Uuid::now_v7(),
                        timestamp: now,
                        flow,
                        track_id: track.id,
                        position: current,
                        line_id: line.id,
                        line_name: line.name.clone(),
                        camera_id: line.camera_id.clone(),
                        confidence: track.confidence,
                    });
                }
            }

            self.last_positions.insert(track.id, current);
        }

        // Prune entries for tracks that left the live set to bound memory
        if self.last_positions.len() > tracks.len() {
            let live: rustc_hash::FxHashSet<TrackId> = tracks.iter().map(|t| t.id).collect();
            self.last_positions.retain(|id, _| live.contains(id));
        }

        events
    }

    /// Number of tracked last positions (bounded by the live set)
    pub fn tracked_positions(&self) -> usize {
        self.last_positions.len()
    }

    /// Forget all last-seen positions
    pub fn reset(&mut self) {
        self.last_positions.clear();
    }
}

impl Default for CrossingDetector {
    fn default() -> Self {
        Self::new()
    }
}
