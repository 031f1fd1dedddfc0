//! Association/tracking engine
//!
//! Maintains the live track set across ticks. Detections are matched to
//! existing tracks with a two-pass greedy association: first by box overlap
//! (IoU), then by center distance against both the raw and the
//! velocity-predicted position. Greedy matching is a deliberate
//! simplification of optimal bipartite assignment; under dense crossing
//! paths it can swap identities.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::types::{Detection, Track, TrackId};

/// Tuning knobs for detection filtering and association
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Detections below this confidence are discarded
    pub confidence_threshold: f32,
    /// Boxes with width or height at or below this are discarded as noise
    pub min_box_side: f32,
    /// Boxes with area at or above this are discarded as noise
    pub max_box_area: f32,
    /// Minimum IoU for a pass-1 overlap match
    pub min_iou: f32,
    /// Maximum center distance for a pass-2 distance match
    pub max_distance: f32,
    /// Misses after which a track is flagged Lost
    pub lost_after: u32,
    /// Misses after which a track is dropped from the live set
    pub max_missed: u32,
    /// Bounded length of each track's position history
    pub history_cap: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            min_box_side: 10.0,
            max_box_area: 100_000.0,
            min_iou: 0.3,
            max_distance: 50.0,
            lost_after: 5,
            max_missed: 10,
            history_cap: 30,
        }
    }
}

/// Summary counters for the tracking engine
#[derive(Debug, Clone, Copy)]
pub struct TrackerStats {
    pub active_tracks: usize,
    pub total_spawned: u64,
}

/// The live track set and its association logic
pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
    total_spawned: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self { config, tracks: Vec::new(), next_id: 1, total_spawned: 0 }
    }

    /// Advance the tracker by one tick and return a snapshot of the live set
    ///
    /// An empty detection list is a valid tick: every live track accrues a
    /// miss and nothing is spawned.
    pub fn update(&mut self, detections: &[Detection], now: DateTime<Utc>) -> Vec<Track> {
        let filtered = self.filter_detections(detections);

        let mut used = vec![false; filtered.len()];
        let mut matched: Vec<Option<usize>> = vec![None; self.tracks.len()];

        // Pass 1: best overlap per track, in track order
        for (ti, track) in self.tracks.iter().enumerate() {
            let mut best: Option<usize> = None;
            let mut best_iou = self.config.min_iou;
            for (di, detection) in filtered.iter().enumerate() {
                if used[di] {
                    continue;
                }
                let iou = track.bbox.iou(&detection.bbox);
                if iou > best_iou {
                    best_iou = iou;
                    best = Some(di);
                }
            }
            if let Some(di) = best {
                matched[ti] = Some(di);
                used[di] = true;
            }
        }

        // Pass 2: nearest center for tracks still unmatched, considering both
        // the last observed position and the velocity-predicted one
        for (ti, track) in self.tracks.iter().enumerate() {
            if matched[ti].is_some() {
                continue;
            }
            let elapsed_secs =
                ((now - track.last_update).num_milliseconds() as f32 / 1000.0).max(0.0);
            let predicted = track.predict(elapsed_secs);

            let mut best: Option<usize> = None;
            let mut best_distance = self.config.max_distance;
            for (di, detection) in filtered.iter().enumerate() {
                if used[di] {
                    continue;
                }
                let center = detection.center();
                let raw = track.center().distance_to(center);
                let from_predicted = predicted.distance_to(center);
                let combined = raw.min(from_predicted);
                if combined < best_distance {
                    best_distance = combined;
                    best = Some(di);
                }
            }
            if let Some(di) = best {
                matched[ti] = Some(di);
                used[di] = true;
            }
        }

        // Apply matches and misses
        for (ti, track) in self.tracks.iter_mut().enumerate() {
            match matched[ti] {
                Some(di) => track.apply_detection(filtered[di], now, self.config.history_cap),
                None => track.record_miss(self.config.lost_after),
            }
        }

        // Retire tracks whose miss counter exceeded the bound
        let max_missed = self.config.max_missed;
        self.tracks.retain(|track| {
            let keep = track.misses <= max_missed;
            if !keep {
                debug!(track_id = %track.id, misses = %track.misses, "track_retired");
            }
            keep
        });

        // Spawn new tracks for detections no pass claimed
        for (di, detection) in filtered.iter().enumerate() {
            if used[di] {
                continue;
            }
            let id = TrackId(self.next_id);
            self.next_id += 1;
            self.total_spawned += 1;
            debug!(track_id = %id, confidence = %detection.confidence, "track_spawned");
            self.tracks.push(Track::spawn(id, detection, now));
        }

        self.tracks.clone()
    }

    /// Drop low-quality detections before association
    fn filter_detections<'a>(&self, detections: &'a [Detection]) -> Vec<&'a Detection> {
        detections
            .iter()
            .filter(|d| d.bbox.is_finite() && d.confidence.is_finite())
            .filter(|d| d.confidence >= self.config.confidence_threshold)
            .filter(|d| d.bbox.w > self.config.min_box_side && d.bbox.h > self.config.min_box_side)
            .filter(|d| d.area() < self.config.max_box_area)
            .collect()
    }

    /// Snapshot of the live track set
    pub fn tracks(&self) -> Vec<Track> {
        self.tracks.clone()
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Clear the live set. The id counter is preserved: ids are unique for
    /// the process lifetime and survive resets.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats { active_tracks: self.tracks.len(), total_spawned: self.total_spawned }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BBox, TrackStatus};
    use chrono::Duration;

    fn det(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
        Detection::new(Utc::now(), BBox::new(x, y, w, h), confidence)
    }

    fn tracker() -> Tracker {
        Tracker::new(TrackerConfig::default())
    }

    #[test]
    fn test_three_detections_spawn_three_tracks() {
        let mut tracker = tracker();
        let now = Utc::now();
        let tracks = tracker.update(
            &[
                det(10.0, 10.0, 20.0, 20.0, 0.9),
                det(200.0, 10.0, 20.0, 20.0, 0.9),
                det(400.0, 10.0, 20.0, 20.0, 0.9),
            ],
            now,
        );

        assert_eq!(tracks.len(), 3);
        let ids: Vec<u64> = tracks.iter().map(|t| t.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_single_detection_matches_nearest_others_miss() {
        let mut tracker = tracker();
        let t0 = Utc::now();
        tracker.update(
            &[
                det(10.0, 10.0, 20.0, 20.0, 0.9),
                det(200.0, 10.0, 20.0, 20.0, 0.9),
                det(400.0, 10.0, 20.0, 20.0, 0.9),
            ],
            t0,
        );

        let t1 = t0 + Duration::milliseconds(33);
        let tracks = tracker.update(&[det(12.0, 12.0, 20.0, 20.0, 0.9)], t1);

        // no new track was created
        assert_eq!(tracks.len(), 3);

        let track1 = tracks.iter().find(|t| t.id == TrackId(1)).unwrap();
        assert_eq!(track1.misses, 0);
        assert_eq!(track1.bbox.x, 12.0);
        assert_eq!(track1.history.len(), 2);

        for id in [2, 3] {
            let track = tracks.iter().find(|t| t.id == TrackId(id)).unwrap();
            assert_eq!(track.misses, 1);
        }
    }

    #[test]
    fn test_miss_counter_resets_on_match() {
        let mut tracker = tracker();
        let mut now = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], now);

        for _ in 0..3 {
            now = now + Duration::milliseconds(33);
            tracker.update(&[], now);
        }
        assert_eq!(tracker.track(TrackId(1)).unwrap().misses, 3);

        now = now + Duration::milliseconds(33);
        tracker.update(&[det(11.0, 11.0, 20.0, 20.0, 0.9)], now);
        let track = tracker.track(TrackId(1)).unwrap();
        assert_eq!(track.misses, 0);
        assert_eq!(track.status, TrackStatus::Active);
    }

    #[test]
    fn test_track_dropped_once_miss_bound_exceeded() {
        let mut tracker = tracker();
        let mut now = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], now);

        // survives exactly max_missed (10) misses, dropped on the 11th
        for _ in 0..10 {
            now = now + Duration::milliseconds(33);
            tracker.update(&[], now);
        }
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.track(TrackId(1)).unwrap().status, TrackStatus::Lost);

        now = now + Duration::milliseconds(33);
        tracker.update(&[], now);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_lost_track_recovers_to_active() {
        let mut tracker = tracker();
        let mut now = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], now);

        for _ in 0..7 {
            now = now + Duration::milliseconds(33);
            tracker.update(&[], now);
        }
        assert_eq!(tracker.track(TrackId(1)).unwrap().status, TrackStatus::Lost);

        now = now + Duration::milliseconds(33);
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], now);
        assert_eq!(tracker.track(TrackId(1)).unwrap().status, TrackStatus::Active);
    }

    #[test]
    fn test_distance_pass_matches_when_overlap_fails() {
        let mut tracker = tracker();
        let t0 = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], t0);

        // moved 30px right: zero IoU with a 20px box, well within 50px
        let t1 = t0 + Duration::milliseconds(33);
        let tracks = tracker.update(&[det(40.0, 10.0, 20.0, 20.0, 0.9)], t1);

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].id, TrackId(1));
    }

    #[test]
    fn test_distant_detection_spawns_instead_of_matching() {
        let mut tracker = tracker();
        let t0 = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], t0);

        let t1 = t0 + Duration::milliseconds(33);
        let tracks = tracker.update(&[det(300.0, 300.0, 20.0, 20.0, 0.9)], t1);

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracker.track(TrackId(1)).unwrap().misses, 1);
        assert!(tracker.track(TrackId(2)).is_some());
    }

    #[test]
    fn test_filter_drops_noise() {
        let mut tracker = tracker();
        let now = Utc::now();
        let tracks = tracker.update(
            &[
                det(10.0, 10.0, 20.0, 20.0, 0.3),        // low confidence
                det(10.0, 10.0, 5.0, 5.0, 0.9),          // too small
                det(10.0, 10.0, 400.0, 400.0, 0.9),      // area over cap
                det(f32::NAN, 10.0, 20.0, 20.0, 0.9),    // non-finite
            ],
            now,
        );
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_empty_detection_list_is_a_valid_tick() {
        let mut tracker = tracker();
        let tracks = tracker.update(&[], Utc::now());
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_reset() {
        let mut tracker = tracker();
        let t0 = Utc::now();
        tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], t0);
        assert_eq!(tracker.tracks()[0].id, TrackId(1));

        tracker.reset();
        assert!(tracker.is_empty());

        let t1 = t0 + Duration::milliseconds(33);
        let tracks = tracker.update(&[det(10.0, 10.0, 20.0, 20.0, 0.9)], t1);
        assert_eq!(tracks[0].id, TrackId(2));
    }

    #[test]
    fn test_stats_counts_spawned() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.update(
            &[det(10.0, 10.0, 20.0, 20.0, 0.9), det(200.0, 10.0, 20.0, 20.0, 0.9)],
            now,
        );
        let stats = tracker.stats();
        assert_eq!(stats.active_tracks, 2);
        assert_eq!(stats.total_spawned, 2);
    }
}
