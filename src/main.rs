//! Footfall - people counting pipeline service
//!
//! Runs the frame orchestrator against the configured frame source and
//! reports rolling statistics until Ctrl+C.
//!
//! Module structure:
//! - `domain/` - core types (Detection, Track, BoundaryLine, CrossingEvent)
//! - `io/` - capability interfaces (frame source, detector, annotator, store)
//! - `services/` - business logic (Tracker, CrossingDetector, CounterLog, Pipeline)
//! - `infra/` - infrastructure (Config, Metrics)

use clap::Parser;
use footfall::infra::Config;
use footfall::io::{
    FrameSource, MemoryStore, NullProvider, PassthroughAnnotator, ReplaySource, SyntheticSource,
};
use footfall::services::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Footfall - directional people counting over a video stream
#[derive(Parser, Debug)]
#[command(name = "footfall", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-track visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "footfall starting");

    let args = Args::parse();
    let config = Config::from_file(&args.config)?;

    info!(
        config_file = %args.config,
        source = %config.video.source,
        target_fps = %config.video.target_fps,
        confidence_threshold = %config.detection.confidence_threshold,
        lines = %config.lines.len(),
        "config_loaded"
    );

    let store = Arc::new(MemoryStore::with_lines(config.initial_lines())?);

    let source: Arc<dyn FrameSource> = match config.video.source.as_str() {
        "synthetic" => Arc::new(SyntheticSource),
        dir => Arc::new(ReplaySource::new(dir, true)),
    };

    // The detection model is an external capability; without one wired in,
    // the service runs acquisition and cadence with zero detections.
    let detector = Arc::new(NullProvider);

    let pipeline = Arc::new(Pipeline::new(
        &config,
        source,
        detector,
        Some(Arc::new(PassthroughAnnotator)),
        store,
    ));

    pipeline.start().await?;

    // Periodic stats reporter
    let reporter = pipeline.clone();
    let interval_secs = config.metrics.interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            let stats = reporter.stats();
            info!(
                state = %stats.state,
                frames = %stats.frames_processed,
                detections = %stats.total_detections,
                events = %stats.total_events,
                tracks = %stats.active_tracks,
                avg_tick_ms = %format!("{:.2}", stats.avg_tick_ms),
                fps = %format!("{:.1}", stats.fps),
                "pipeline_stats"
            );
        }
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");

    pipeline.stop().await?;

    let today = chrono::Utc::now().date_naive();
    let snapshot = pipeline.stats_for_date(today);
    info!(
        date = %snapshot.date,
        entries = %snapshot.total_entries,
        exits = %snapshot.total_exits,
        occupancy = %snapshot.current_occupancy(),
        peak = %snapshot.peak_occupancy,
        "final_daily_totals"
    );

    info!("footfall shutdown complete");
    Ok(())
}
