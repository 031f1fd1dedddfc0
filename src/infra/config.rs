//! Configuration loading from TOML files
//!
//! Config file is selected via the --config command line argument; every
//! field carries a serde default so a partial file (or none in tests) is
//! valid.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::domain::types::{BoundaryLine, LineDirection, LineId, Point};
use crate::services::tracker::TrackerConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoConfig {
    /// Frame source descriptor: "synthetic" or a directory of frame files
    #[serde(default = "default_video_source")]
    pub source: String,
    /// Target processing cadence in ticks per second
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    /// Wait between reads when the source returns no frame
    #[serde(default = "default_idle_wait_ms")]
    pub idle_wait_ms: u64,
}

fn default_video_source() -> String {
    "synthetic".to_string()
}

fn default_target_fps() -> u32 {
    30
}

fn default_idle_wait_ms() -> u64 {
    10
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: default_video_source(),
            target_fps: default_target_fps(),
            idle_wait_ms: default_idle_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_min_box_side")]
    pub min_box_side: f32,
    #[serde(default = "default_max_box_area")]
    pub max_box_area: f32,
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_min_box_side() -> f32 {
    10.0
}

fn default_max_box_area() -> f32 {
    100_000.0
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            min_box_side: default_min_box_side(),
            max_box_area: default_max_box_area(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "default_min_iou")]
    pub min_iou: f32,
    #[serde(default = "default_lost_after")]
    pub lost_after: u32,
    #[serde(default = "default_max_missed")]
    pub max_missed: u32,
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

fn default_max_distance() -> f32 {
    50.0
}

fn default_min_iou() -> f32 {
    0.3
}

fn default_lost_after() -> u32 {
    5
}

fn default_max_missed() -> u32 {
    10
}

fn default_history_cap() -> usize {
    30
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            max_distance: default_max_distance(),
            min_iou: default_min_iou(),
            lost_after: default_lost_after(),
            max_missed: default_max_missed(),
            history_cap: default_history_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    /// Pause after a failed tick before the loop resumes
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Produce annotated frames for the current-frame query
    #[serde(default)]
    pub annotate: bool,
}

fn default_error_backoff_ms() -> u64 {
    1000
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { error_backoff_ms: default_error_backoff_ms(), annotate: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Interval between periodic stats log lines
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

fn default_metrics_interval_secs() -> u64 {
    10
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

/// A boundary line as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    pub id: u32,
    pub name: String,
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub direction: LineDirection,
    #[serde(default = "default_line_active")]
    pub active: bool,
    #[serde(default)]
    pub camera: Option<String>,
}

fn default_line_active() -> bool {
    true
}

impl LineConfig {
    pub fn to_boundary_line(&self) -> BoundaryLine {
        BoundaryLine {
            id: LineId(self.id),
            name: self.name.clone(),
            start: Point::new(self.start[0], self.start[1]),
            end: Point::new(self.end[0], self.end[1]),
            direction: self.direction,
            active: self.active,
            camera_id: self.camera.clone(),
        }
    }
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default, rename = "pipeline")]
    pub run_loop: LoopConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub lines: Vec<LineConfig>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Tracker parameters assembled from the detection and tracking sections
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            confidence_threshold: self.detection.confidence_threshold,
            min_box_side: self.detection.min_box_side,
            max_box_area: self.detection.max_box_area,
            min_iou: self.tracking.min_iou,
            max_distance: self.tracking.max_distance,
            lost_after: self.tracking.lost_after,
            max_missed: self.tracking.max_missed,
            history_cap: self.tracking.history_cap,
        }
    }

    /// Target interval between ticks
    pub fn tick_interval(&self) -> std::time::Duration {
        let fps = self.video.target_fps.max(1);
        std::time::Duration::from_secs_f64(1.0 / fps as f64)
    }

    /// Boundary lines configured in the file
    pub fn initial_lines(&self) -> Vec<BoundaryLine> {
        self.lines.iter().map(LineConfig::to_boundary_line).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.video.source, "synthetic");
        assert_eq!(config.video.target_fps, 30);
        assert_eq!(config.detection.confidence_threshold, 0.5);
        assert_eq!(config.tracking.max_distance, 50.0);
        assert_eq!(config.tracking.max_missed, 10);
        assert_eq!(config.run_loop.error_backoff_ms, 1000);
        assert!(config.lines.is_empty());
    }

    #[test]
    fn test_tick_interval_from_fps() {
        let mut config = Config::default();
        config.video.target_fps = 25;
        assert_eq!(config.tick_interval(), std::time::Duration::from_millis(40));
    }

    #[test]
    fn test_partial_toml_parses_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [video]
            target_fps = 10

            [[lines]]
            id = 7
            name = "front door"
            start = [0.0, 100.0]
            end = [500.0, 100.0]
            direction = "top_to_bottom"
            "#,
        )
        .unwrap();

        assert_eq!(config.video.target_fps, 10);
        assert_eq!(config.video.source, "synthetic");

        let lines = config.initial_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].id, LineId(7));
        assert_eq!(lines[0].direction, LineDirection::TopToBottom);
        assert!(lines[0].active);
        assert!(lines[0].validate().is_ok());
    }
}
