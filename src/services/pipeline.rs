//! Frame orchestrator
//!
//! Owns the per-tick sequence (acquire -> detect -> track -> scan crossings
//! -> count -> optional annotate) and the lifecycle around it. One dedicated
//! background task runs the loop; every stage of a tick executes
//! sequentially on it so ordering between detection, tracking, crossing and
//! counting is preserved. The external surface may be called concurrently:
//! tracker, crossing detector and counter live behind a single core lock
//! with the loop as the only logical writer.
//!
//! The loop itself is never fatal. Per-tick failures are logged and followed
//! by a brief backoff; only explicit cancellation stops it.

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::error::PipelineError;
use crate::domain::stats::{CounterSnapshot, PipelineStats};
use crate::domain::types::{BoundaryLine, CrossingEvent, LineId, Track};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::annotate::FrameAnnotator;
use crate::io::detector::DetectionProvider;
use crate::io::source::{FrameHandle, FrameSource};
use crate::io::store::BoundaryStore;
use crate::services::counter::CounterLog;
use crate::services::crossing::CrossingDetector;
use crate::services::tracker::Tracker;

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Stopped => "stopped",
            RunState::Starting => "starting",
            RunState::Running => "running",
            RunState::Stopping => "stopping",
        }
    }
}

/// Loop tuning resolved from config at construction time
#[derive(Debug, Clone)]
struct LoopSettings {
    tick_interval: Duration,
    idle_wait: Duration,
    error_backoff: Duration,
    confidence_threshold: f32,
    annotate: bool,
}

/// Mutable per-tick state: single logical writer (the loop), queries take
/// the same lock briefly for consistent reads
struct PipelineCore {
    tracker: Tracker,
    crossings: CrossingDetector,
    counter: CounterLog,
}

struct Shared {
    settings: LoopSettings,
    detector: Arc<dyn DetectionProvider>,
    annotator: Option<Arc<dyn FrameAnnotator>>,
    store: Arc<dyn BoundaryStore>,
    metrics: Metrics,
    core: Mutex<PipelineCore>,
    latest_frame: Mutex<Option<Bytes>>,
    state: Mutex<RunState>,
}

/// The counting pipeline and its transport-agnostic surface
pub struct Pipeline {
    shared: Arc<Shared>,
    source: Arc<dyn FrameSource>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        source: Arc<dyn FrameSource>,
        detector: Arc<dyn DetectionProvider>,
        annotator: Option<Arc<dyn FrameAnnotator>>,
        store: Arc<dyn BoundaryStore>,
    ) -> Self {
        let settings = LoopSettings {
            tick_interval: config.tick_interval(),
            idle_wait: Duration::from_millis(config.video.idle_wait_ms),
            error_backoff: Duration::from_millis(config.run_loop.error_backoff_ms),
            confidence_threshold: config.detection.confidence_threshold,
            annotate: config.run_loop.annotate,
        };

        let shared = Arc::new(Shared {
            settings,
            detector,
            annotator,
            store,
            metrics: Metrics::new(),
            core: Mutex::new(PipelineCore {
                tracker: Tracker::new(config.tracker_config()),
                crossings: CrossingDetector::new(),
                counter: CounterLog::new(),
            }),
            latest_frame: Mutex::new(None),
            state: Mutex::new(RunState::Stopped),
        });

        Self {
            shared,
            source,
            shutdown: Mutex::new(None),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Acquire the frame source and schedule the processing loop
    ///
    /// Returns without waiting for the first processed frame. Rejected with
    /// `AlreadyRunning` when the pipeline is not stopped.
    pub async fn start(&self) -> Result<(), PipelineError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                RunState::Stopped => *state = RunState::Starting,
                _ => return Err(PipelineError::AlreadyRunning),
            }
        }
        info!("pipeline_starting");

        let handle = match self.source.open().await {
            Ok(handle) => handle,
            Err(e) => {
                *self.shared.state.lock() = RunState::Stopped;
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock() = Some(shutdown_tx);

        self.shared.metrics.mark_started();
        *self.shared.state.lock() = RunState::Running;

        let shared = self.shared.clone();
        let task = tokio::spawn(run_loop(shared, handle, shutdown_rx));
        *self.task.lock().await = Some(task);

        info!("pipeline_started");
        Ok(())
    }

    /// Signal cancellation and wait for the loop to exit
    ///
    /// Rejected with `NotRunning` when the pipeline is not running.
    pub async fn stop(&self) -> Result<(), PipelineError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                RunState::Running => *state = RunState::Stopping,
                _ => return Err(PipelineError::NotRunning),
            }
        }
        info!("pipeline_stopping");

        if let Some(shutdown_tx) = self.shutdown.lock().take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }

        *self.shared.state.lock() = RunState::Stopped;
        info!("pipeline_stopped");
        Ok(())
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Rolling statistics for the current run
    pub fn stats(&self) -> PipelineStats {
        let active_tracks = self.shared.core.lock().tracker.len();
        let metrics = &self.shared.metrics;
        PipelineStats {
            state: self.state().as_str().to_string(),
            frames_processed: metrics.frames(),
            total_detections: metrics.detections(),
            total_events: metrics.events(),
            active_tracks,
            avg_tick_ms: metrics.avg_tick_ms(),
            fps: metrics.fps(),
            uptime_secs: metrics.uptime_secs(),
        }
    }

    /// Latest (optionally annotated) frame, when one has been processed
    pub fn current_frame(&self) -> Option<Bytes> {
        self.shared.latest_frame.lock().clone()
    }

    /// Live track snapshot
    pub fn tracks(&self) -> Vec<Track> {
        self.shared.core.lock().tracker.tracks()
    }

    pub fn add_line(&self, line: BoundaryLine) -> Result<LineId, PipelineError> {
        self.shared.store.add(line)
    }

    pub fn remove_line(&self, id: LineId) -> Result<(), PipelineError> {
        self.shared.store.remove(id)
    }

    pub fn lines(&self) -> Vec<BoundaryLine> {
        self.shared.store.all()
    }

    pub fn events_for_date(&self, date: NaiveDate) -> Vec<CrossingEvent> {
        self.shared.core.lock().counter.events_for_date(date)
    }

    pub fn stats_for_date(&self, date: NaiveDate) -> CounterSnapshot {
        self.shared.core.lock().counter.stats_for_date(date)
    }

    pub fn stats_for_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<CounterSnapshot> {
        self.shared.core.lock().counter.stats_for_range(start, end)
    }

    /// Clear the event log and the live tracking state
    ///
    /// Takes the core lock, so an in-flight tick either completes before the
    /// reset or starts against the cleared state - never a torn mixture.
    pub fn reset_counters(&self) {
        let mut core = self.shared.core.lock();
        core.counter.reset();
        core.tracker.reset();
        core.crossings.reset();
        info!("counters_reset");
    }
}

struct TickReport {
    detections: usize,
    events: usize,
}

async fn run_loop(
    shared: Arc<Shared>,
    mut handle: Box<dyn FrameHandle>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("pipeline_loop_started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        let tick_start = Instant::now();

        // Acquire: an empty or failed read skips the tick after a bounded wait
        let frame = match handle.read_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                shared.metrics.record_empty_read();
                if wait_or_shutdown(shared.settings.idle_wait, &mut shutdown).await {
                    break;
                }
                continue;
            }
            Err(e) => {
                warn!(error = %e, "frame_read_failed");
                shared.metrics.record_empty_read();
                if wait_or_shutdown(shared.settings.idle_wait, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        match process_tick(&shared, frame).await {
            Ok(report) => {
                let latency_ms = tick_start.elapsed().as_secs_f64() * 1000.0;
                shared.metrics.record_tick(
                    latency_ms,
                    report.detections as u64,
                    report.events as u64,
                );
            }
            Err(e) => {
                warn!(error = %e, "tick_failed");
                shared.metrics.record_tick_error();
                if wait_or_shutdown(shared.settings.error_backoff, &mut shutdown).await {
                    break;
                }
                continue;
            }
        }

        // Hold the configured cadence; never sleep a negative duration
        let elapsed = tick_start.elapsed();
        if elapsed < shared.settings.tick_interval {
            if wait_or_shutdown(shared.settings.tick_interval - elapsed, &mut shutdown).await {
                break;
            }
        }
    }

    info!("pipeline_loop_stopped");
}

/// Sleep for `duration` unless cancellation arrives first
async fn wait_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.changed() => true,
    }
}

async fn process_tick(shared: &Shared, frame: Bytes) -> Result<TickReport, PipelineError> {
    let now = Utc::now();

    // Publish the raw frame first so the query surface always has something,
    // even when detection fails mid-tick
    *shared.latest_frame.lock() = Some(frame.clone());

    let detections = shared
        .detector
        .detect(&frame, shared.settings.confidence_threshold)
        .await?;
    let lines = shared.store.active();

    let (tracks, event_count) = {
        let mut core = shared.core.lock();
        let tracks = core.tracker.update(&detections, now);
        let events = core.crossings.scan(&tracks, &lines, now);
        for event in &events {
            info!(
                track_id = %event.track_id,
                line = %event.line_name,
                flow = %event.flow.as_str(),
                confidence = %event.confidence,
                "crossing_counted"
            );
        }
        let event_count = events.len();
        core.counter.record(events);
        (tracks, event_count)
    };

    if shared.settings.annotate {
        if let Some(annotator) = &shared.annotator {
            let annotated = annotator.annotate(&frame, &detections, &tracks, &lines);
            *shared.latest_frame.lock() = Some(annotated);
        }
    }

    Ok(TickReport { detections: detections.len(), events: event_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BBox, LineDirection, Point};
    use crate::io::annotate::PassthroughAnnotator;
    use crate::io::detector::{NullProvider, ScriptedProvider};
    use crate::io::source::SyntheticSource;
    use crate::io::store::MemoryStore;

    fn fast_config() -> Config {
        let mut config = Config::default();
        config.video.target_fps = 200;
        config.video.idle_wait_ms = 1;
        config.run_loop.error_backoff_ms = 5;
        config
    }

    fn entrance_line() -> BoundaryLine {
        BoundaryLine {
            id: LineId(1),
            name: "entrance".to_string(),
            start: Point::new(0.0, 100.0),
            end: Point::new(500.0, 100.0),
            direction: LineDirection::TopToBottom,
            active: true,
            camera_id: Some("cam-1".to_string()),
        }
    }

    /// Walk one subject downward across y=100 in 5px steps, avoiding centers
    /// exactly on the line
    fn walk_down_script() -> Vec<Vec<(BBox, f32)>> {
        (0..12)
            .map(|i| {
                let center_y = 62.0 + 5.0 * i as f32;
                vec![(BBox::new(240.0, center_y - 10.0, 20.0, 20.0), 0.9)]
            })
            .collect()
    }

    fn pipeline_with(
        config: Config,
        provider: Arc<ScriptedProvider>,
        store: Arc<MemoryStore>,
    ) -> Pipeline {
        Pipeline::new(
            &config,
            Arc::new(SyntheticSource),
            provider,
            Some(Arc::new(PassthroughAnnotator)),
            store,
        )
    }

    async fn drain_script(provider: &ScriptedProvider) {
        for _ in 0..200 {
            if provider.remaining() == 0 {
                // one extra interval so the last scripted tick finishes
                tokio::time::sleep(Duration::from_millis(20)).await;
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("script was not consumed in time");
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let pipeline = pipeline_with(
            fast_config(),
            Arc::new(ScriptedProvider::from_frames(Vec::new())),
            Arc::new(MemoryStore::new()),
        );

        pipeline.start().await.unwrap();
        assert!(matches!(pipeline.start().await, Err(PipelineError::AlreadyRunning)));
        assert!(pipeline.is_running());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_rejected() {
        let pipeline = pipeline_with(
            fast_config(),
            Arc::new(ScriptedProvider::from_frames(Vec::new())),
            Arc::new(MemoryStore::new()),
        );

        assert!(matches!(pipeline.stop().await, Err(PipelineError::NotRunning)));

        pipeline.start().await.unwrap();
        pipeline.stop().await.unwrap();
        assert!(matches!(pipeline.stop().await, Err(PipelineError::NotRunning)));
    }

    #[tokio::test]
    async fn test_scripted_walk_is_counted_as_entry() {
        let provider = Arc::new(ScriptedProvider::from_frames(walk_down_script()));
        let store = Arc::new(MemoryStore::with_lines(vec![entrance_line()]).unwrap());
        let pipeline = pipeline_with(fast_config(), provider.clone(), store);

        pipeline.start().await.unwrap();
        drain_script(&provider).await;
        pipeline.stop().await.unwrap();

        let today = Utc::now().date_naive();
        let stats = pipeline.stats_for_date(today);
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_exits, 0);

        let events = pipeline.events_for_date(today);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].line_name, "entrance");
        assert_eq!(events[0].camera_id.as_deref(), Some("cam-1"));

        let pipeline_stats = pipeline.stats();
        assert!(pipeline_stats.frames_processed > 0);
        assert!(pipeline_stats.total_detections >= 12);
        assert_eq!(pipeline_stats.total_events, 1);
        assert!(pipeline.current_frame().is_some());
    }

    #[tokio::test]
    async fn test_reset_while_running_clears_counts() {
        let provider = Arc::new(ScriptedProvider::from_frames(walk_down_script()));
        let store = Arc::new(MemoryStore::with_lines(vec![entrance_line()]).unwrap());
        let pipeline = pipeline_with(fast_config(), provider.clone(), store);

        pipeline.start().await.unwrap();
        drain_script(&provider).await;

        let today = Utc::now().date_naive();
        assert_eq!(pipeline.stats_for_date(today).total_entries, 1);

        pipeline.reset_counters();
        assert_eq!(pipeline.stats_for_date(today).total_entries, 0);
        for snapshot in pipeline.stats_for_range(today.pred_opt().unwrap(), today) {
            assert_eq!(snapshot.total_entries + snapshot.total_exits, 0);
        }
        assert!(pipeline.tracks().is_empty());

        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_line_management_surface() {
        let pipeline = pipeline_with(
            fast_config(),
            Arc::new(ScriptedProvider::from_frames(Vec::new())),
            Arc::new(MemoryStore::new()),
        );

        let mut line = entrance_line();
        line.name = String::new();
        assert!(matches!(pipeline.add_line(line), Err(PipelineError::InvalidLine(_))));

        let id = pipeline.add_line(entrance_line()).unwrap();
        assert_eq!(pipeline.lines().len(), 1);

        assert!(matches!(
            pipeline.remove_line(LineId(42)),
            Err(PipelineError::UnknownLine(_))
        ));
        pipeline.remove_line(id).unwrap();
        assert!(pipeline.lines().is_empty());
    }

    #[tokio::test]
    async fn test_loop_survives_with_null_provider() {
        let config = fast_config();
        let pipeline = Pipeline::new(
            &config,
            Arc::new(SyntheticSource),
            Arc::new(NullProvider),
            None,
            Arc::new(MemoryStore::new()),
        );

        pipeline.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        pipeline.stop().await.unwrap();

        let stats = pipeline.stats();
        assert!(stats.frames_processed > 0);
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.active_tracks, 0);
    }
}
