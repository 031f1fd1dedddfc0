//! Scripted walk-through simulation
//!
//! Drives the full pipeline deterministically without a camera or model:
//! a scripted detection provider walks subjects across a boundary line in
//! both directions, then the daily snapshot and pipeline statistics are
//! printed as JSON.

use clap::Parser;
use footfall::domain::types::{BBox, BoundaryLine, LineDirection, LineId, Point};
use footfall::infra::Config;
use footfall::io::{MemoryStore, ScriptedProvider, SyntheticSource};
use footfall::services::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Footfall simulation - scripted subjects crossing a boundary line
#[derive(Parser, Debug)]
#[command(name = "footfall-sim", version, about)]
struct Args {
    /// Subjects walking in across the line
    #[arg(long, default_value_t = 3)]
    entries: u32,

    /// Subjects walking out across the line
    #[arg(long, default_value_t = 1)]
    exits: u32,
}

/// Steps each walker takes; 5px per tick across the line at y=100
const WALK_TICKS: usize = 12;

/// Script one downward (entry) phase followed by one upward (exit) phase
///
/// Walkers within a phase run concurrently at well-separated x positions so
/// greedy association never confuses them.
fn build_script(entries: u32, exits: u32) -> Vec<Vec<(BBox, f32)>> {
    let mut frames = Vec::new();

    for tick in 0..WALK_TICKS {
        let center_y = 62.0 + 5.0 * tick as f32;
        frames.push(
            (0..entries)
                .map(|k| {
                    let center_x = 60.0 + 120.0 * k as f32;
                    (BBox::new(center_x - 10.0, center_y - 10.0, 20.0, 20.0), 0.9)
                })
                .collect(),
        );
    }

    for tick in 0..WALK_TICKS {
        let center_y = 117.0 - 5.0 * tick as f32;
        frames.push(
            (0..exits)
                .map(|k| {
                    let center_x = 60.0 + 120.0 * k as f32;
                    (BBox::new(center_x - 10.0, center_y - 10.0, 20.0, 20.0), 0.9)
                })
                .collect(),
        );
    }

    frames
}

/// Boundary at y=100 spanning every walker's x position
fn entrance_line(walkers: u32) -> BoundaryLine {
    let span = 60.0 + 120.0 * walkers as f32;
    BoundaryLine {
        id: LineId(1),
        name: "entrance".to_string(),
        start: Point::new(0.0, 100.0),
        end: Point::new(span, 100.0),
        direction: LineDirection::TopToBottom,
        active: true,
        camera_id: Some("sim".to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let args = Args::parse();
    info!(entries = %args.entries, exits = %args.exits, "simulation_starting");

    let mut config = Config::default();
    config.video.target_fps = 100;

    let provider = Arc::new(ScriptedProvider::from_frames(build_script(args.entries, args.exits)));
    let store = Arc::new(MemoryStore::with_lines(vec![entrance_line(args.entries.max(args.exits))])?);

    let pipeline = Pipeline::new(
        &config,
        Arc::new(SyntheticSource),
        provider.clone(),
        None,
        store,
    );

    pipeline.start().await?;

    // Wait for the script to drain, then one extra interval for the tail tick
    while provider.remaining() > 0 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    pipeline.stop().await?;

    let today = chrono::Utc::now().date_naive();
    let report = serde_json::json!({
        "daily": pipeline.stats_for_date(today),
        "pipeline": pipeline.stats(),
        "events": pipeline.events_for_date(today),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
