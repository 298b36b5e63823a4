// src/main.rs

mod config;
mod dispatch;
mod engine;
mod event_log;
mod metrics;
mod pipeline;
mod replay;
mod snapshot;
mod status;
mod store;
mod tracker;
mod types;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use config::Config;
use dispatch::Dispatchers;
use engine::AlertEngine;
use event_log::EventLog;
use metrics::PipelineMetrics;
use pipeline::DetectionPipeline;
use replay::Scenario;
use status::StatusBoard;
use tracker::TrackerAdapter;

/// Grace period for the side channels to finish what they queued.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.level.as_str())
        .init();

    info!("🌊 Flood Sentinel Starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Watching classes {:?} at confidence >= {:.2}, cooldown {:.1}s",
        config.detection.classes,
        config.detection.confidence_threshold,
        config.detection.cooldown_seconds
    );

    let metrics = PipelineMetrics::new();
    let board = Arc::new(StatusBoard::new(&config.web));
    let dispatchers = Dispatchers::start(&config, board.clone(), metrics.clone())?;

    let output_dir = Path::new(&config.output.dir);
    let event_log = EventLog::open(&output_dir.join(&config.output.log_file))?;
    info!("✓ Event log at {}", event_log.path().display());

    let engine = AlertEngine::new(&config.detection, output_dir);
    let mut pipeline = DetectionPipeline::new(
        &config,
        engine,
        event_log,
        dispatchers,
        board.clone(),
        metrics,
    );

    let scenario = Scenario::load(&config.replay.scenario)?;
    info!(
        "✓ Scenario loaded: {} frame(s) from {}",
        scenario.frame_count(),
        config.replay.scenario
    );

    let start = types::unix_now();
    let (mut feed, mut tracker) = scenario.into_runtime(&config, start);

    let mut previous_timestamp = start;
    while let Some(frame) = feed.next_frame() {
        if config.replay.realtime {
            let delta = frame.timestamp - previous_timestamp;
            if delta > 0.0 {
                if let Ok(pause) = Duration::try_from_secs_f64(delta) {
                    tokio::time::sleep(pause).await;
                }
            }
        }
        previous_timestamp = frame.timestamp;

        let detections = match tracker.track(&frame) {
            Ok(detections) => detections,
            Err(e) => {
                error!("tracker failed on frame {}: {:#}", frame.frame_id, e);
                continue;
            }
        };
        pipeline.process_frame(&frame, &detections);
    }

    let status = pipeline.status(types::unix_now());
    info!(
        "Final status: humanDetected={}, {} recent track(s)",
        status.human_detected,
        status.detections.len()
    );

    info!("Draining side channels (up to {:?})...", SHUTDOWN_GRACE);
    let tracks_live = pipeline.track_count();
    let summary = pipeline.shutdown(SHUTDOWN_GRACE).await;

    info!("\n📊 Final Report:");
    info!("  Frames processed: {}", summary.total_frames);
    info!("  Detections seen: {}", summary.total_detections);
    if summary.malformed_detections > 0 {
        warn!(
            "  ⚠️  Malformed detections skipped: {}",
            summary.malformed_detections
        );
    }
    info!("  🚨 Alerts emitted: {}", summary.alerts_emitted);
    info!(
        "  🔊 Voice announcements: {} scheduled, {} completed",
        summary.voice_scheduled, summary.voice_completed
    );
    info!(
        "  🌐 Remote alerts: {} sent, {} failed",
        summary.remote_sent, summary.remote_failures
    );
    info!(
        "  📡 Status pushes: {} sent, {} failed",
        summary.web_pushes, summary.web_failures
    );
    if summary.queue_drops > 0 {
        warn!("  ⚠️  Dispatch items dropped: {}", summary.queue_drops);
    }
    if summary.log_failures > 0 || summary.snapshot_failures > 0 {
        warn!(
            "  ⚠️  Log failures: {}, snapshot failures: {}",
            summary.log_failures, summary.snapshot_failures
        );
    }
    info!(
        "  Tracks live: {}, evicted: {}",
        tracks_live, summary.tracks_evicted
    );
    info!("  Processing speed: {:.1} FPS", summary.fps);

    Ok(())
}
