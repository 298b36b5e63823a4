// src/pipeline.rs
//
// Per-frame orchestration: run the decision engine, persist what it decided
// (snapshot + event log), fan the event out to the side channels. Everything
// in here is synchronous except the fan-out, which only enqueues.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::telegram::RemoteAlert;
use crate::dispatch::Dispatchers;
use crate::engine::AlertEngine;
use crate::event_log::EventLog;
use crate::metrics::{MetricsSummary, PipelineMetrics};
use crate::snapshot;
use crate::status::{StatusBoard, StatusPayload, WebUpdate};
use crate::types::{Frame, TrackedDetection};

pub struct DetectionPipeline {
    engine: AlertEngine,
    event_log: EventLog,
    dispatchers: Dispatchers,
    board: Arc<StatusBoard>,
    metrics: PipelineMetrics,
    ttl_seconds: f64,
    sweep_interval: f64,
    last_sweep: Option<f64>,
}

impl DetectionPipeline {
    pub fn new(
        config: &Config,
        engine: AlertEngine,
        event_log: EventLog,
        dispatchers: Dispatchers,
        board: Arc<StatusBoard>,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            engine,
            event_log,
            dispatchers,
            board,
            metrics,
            ttl_seconds: config.tracks.ttl_seconds,
            sweep_interval: config.tracks.sweep_interval_seconds,
            last_sweep: None,
        }
    }

    /// Feeds one frame worth of tracked detections through the pipeline.
    /// Never blocks on a side channel and never fails; every I/O problem
    /// downgrades to a warning.
    pub fn process_frame(&mut self, frame: &Frame, detections: &[TrackedDetection]) {
        let now = frame.timestamp;
        self.metrics.inc(&self.metrics.total_frames);
        self.metrics
            .add(&self.metrics.total_detections, detections.len() as u64);

        let decisions = self.engine.process_frame(detections, now);
        self.metrics
            .add(&self.metrics.malformed_detections, decisions.malformed as u64);

        for request in decisions.voice {
            info!(
                "new {}#{} in view, scheduling announcement",
                request.label, request.track_id
            );
            self.dispatchers.announce(request);
        }

        for event in decisions.alerts {
            info!(
                "🚨 {} alert for track {} ({:.2})",
                event.label, event.track_id, event.confidence
            );
            match snapshot::write_jpeg(frame, &event.artifact_path) {
                Ok(()) => info!("💾 snapshot saved to {}", event.artifact_path.display()),
                Err(e) => {
                    warn!(
                        "snapshot failed for {}#{}: {:#}",
                        event.label, event.track_id, e
                    );
                    self.metrics.inc(&self.metrics.snapshot_failures);
                }
            }
            if let Err(e) = self.event_log.append(&event) {
                warn!("event log append failed: {:#}", e);
                self.metrics.inc(&self.metrics.log_failures);
            }
            self.dispatchers.send_alert(RemoteAlert::from(&event));
            self.dispatchers.publish(WebUpdate::from(&event));
            self.metrics.inc(&self.metrics.alerts_emitted);
        }

        self.maybe_sweep(now);
    }

    fn maybe_sweep(&mut self, now: f64) {
        let due = match self.last_sweep {
            Some(last) => now - last >= self.sweep_interval,
            None => {
                self.last_sweep = Some(now);
                false
            }
        };
        if due {
            let evicted = self.engine.evict_stale(now, self.ttl_seconds);
            if evicted > 0 {
                info!("⏰ evicted {} idle track(s)", evicted);
                self.metrics
                    .add(&self.metrics.tracks_evicted, evicted as u64);
            }
            self.last_sweep = Some(now);
        }
    }

    /// Current status payload, as a query at time `now` would see it.
    pub fn status(&self, now: f64) -> StatusPayload {
        self.board.status(now)
    }

    pub fn track_count(&self) -> usize {
        self.engine.track_count()
    }

    /// Closes the side channels, drains them within `grace`, and returns the
    /// final counter snapshot.
    pub async fn shutdown(self, grace: Duration) -> MetricsSummary {
        self.dispatchers.shutdown(grace).await;
        self.metrics.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn test_frame(frame_id: u64, timestamp: f64) -> Frame {
        Frame {
            frame_id,
            timestamp,
            width: 8,
            height: 6,
            data: vec![0x40; 8 * 6 * 3],
        }
    }

    fn person(track_id: i64) -> TrackedDetection {
        TrackedDetection {
            track_id,
            label: "person".to_string(),
            confidence: 0.82,
            bbox: BoundingBox::new(10, 10, 50, 80),
        }
    }

    fn quiet_config(out_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.voice.enabled = false;
        config.telegram.enabled = false;
        config.web.update_url = String::new();
        config.output.dir = out_dir.to_string_lossy().into_owned();
        config
    }

    fn build_pipeline(config: &Config) -> (DetectionPipeline, Arc<StatusBoard>) {
        let out = std::path::Path::new(&config.output.dir);
        let metrics = PipelineMetrics::new();
        let board = Arc::new(StatusBoard::new(&config.web));
        let dispatchers = Dispatchers::start(config, board.clone(), metrics.clone()).unwrap();
        let engine = AlertEngine::new(&config.detection, out);
        let event_log = EventLog::open(&out.join(&config.output.log_file)).unwrap();
        let pipeline =
            DetectionPipeline::new(config, engine, event_log, dispatchers, board.clone(), metrics);
        (pipeline, board)
    }

    #[tokio::test]
    async fn test_alert_path_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("detections");
        let config = quiet_config(&out);
        let (mut pipeline, board) = build_pipeline(&config);

        let base = 1_700_000_000.0;
        pipeline.process_frame(&test_frame(0, base), &[person(5)]);
        pipeline.process_frame(&test_frame(1, base + 1.0), &[person(5)]);
        pipeline.process_frame(&test_frame(2, base + 2.1), &[person(5)]);

        assert_eq!(pipeline.track_count(), 1);
        let summary = pipeline.shutdown(Duration::from_secs(5)).await;
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.alerts_emitted, 2);
        assert_eq!(summary.log_failures, 0);
        assert_eq!(summary.snapshot_failures, 0);

        // header + one row per alert
        let log = std::fs::read_to_string(out.join("detections_log.csv")).unwrap();
        assert_eq!(log.lines().count(), 3);

        // one artifact per alert
        let artifacts = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "jpg").unwrap_or(false))
            .count();
        assert_eq!(artifacts, 2);

        // the drained web channel reflected the alert onto the board
        let payload = board.status(base + 2.1);
        assert!(payload.human_detected);
        assert_eq!(payload.track_id, 5);
        assert_eq!(payload.detections.len(), 1);
    }

    #[tokio::test]
    async fn test_eviction_sweep_runs_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("detections");
        let mut config = quiet_config(&out);
        config.tracks.ttl_seconds = 10.0;
        config.tracks.sweep_interval_seconds = 30.0;
        let (mut pipeline, _board) = build_pipeline(&config);

        pipeline.process_frame(&test_frame(0, 0.0), &[person(1)]);
        assert_eq!(pipeline.track_count(), 1);

        // track 1 idle past its ttl by the time the sweep comes due
        pipeline.process_frame(&test_frame(1, 31.0), &[person(2)]);
        assert_eq!(pipeline.track_count(), 1);

        let summary = pipeline.shutdown(Duration::from_secs(5)).await;
        assert_eq!(summary.tracks_evicted, 1);
    }
}
