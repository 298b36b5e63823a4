// src/metrics.rs
//
// Runtime observability. Cheap atomic counters shared between the frame
// loop and the dispatch workers, reported once at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub total_detections: Arc<AtomicU64>,
    pub malformed_detections: Arc<AtomicU64>,
    pub alerts_emitted: Arc<AtomicU64>,
    pub voice_scheduled: Arc<AtomicU64>,
    pub voice_completed: Arc<AtomicU64>,
    pub voice_failures: Arc<AtomicU64>,
    pub remote_sent: Arc<AtomicU64>,
    pub remote_failures: Arc<AtomicU64>,
    pub web_pushes: Arc<AtomicU64>,
    pub web_failures: Arc<AtomicU64>,
    pub log_failures: Arc<AtomicU64>,
    pub snapshot_failures: Arc<AtomicU64>,
    pub queue_drops: Arc<AtomicU64>,
    pub tracks_evicted: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            total_detections: Arc::new(AtomicU64::new(0)),
            malformed_detections: Arc::new(AtomicU64::new(0)),
            alerts_emitted: Arc::new(AtomicU64::new(0)),
            voice_scheduled: Arc::new(AtomicU64::new(0)),
            voice_completed: Arc::new(AtomicU64::new(0)),
            voice_failures: Arc::new(AtomicU64::new(0)),
            remote_sent: Arc::new(AtomicU64::new(0)),
            remote_failures: Arc::new(AtomicU64::new(0)),
            web_pushes: Arc::new(AtomicU64::new(0)),
            web_failures: Arc::new(AtomicU64::new(0)),
            log_failures: Arc::new(AtomicU64::new(0)),
            snapshot_failures: Arc::new(AtomicU64::new(0)),
            queue_drops: Arc::new(AtomicU64::new(0)),
            tracks_evicted: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            fps: self.fps(),
            total_detections: self.total_detections.load(Ordering::Relaxed),
            malformed_detections: self.malformed_detections.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
            voice_scheduled: self.voice_scheduled.load(Ordering::Relaxed),
            voice_completed: self.voice_completed.load(Ordering::Relaxed),
            voice_failures: self.voice_failures.load(Ordering::Relaxed),
            remote_sent: self.remote_sent.load(Ordering::Relaxed),
            remote_failures: self.remote_failures.load(Ordering::Relaxed),
            web_pushes: self.web_pushes.load(Ordering::Relaxed),
            web_failures: self.web_failures.load(Ordering::Relaxed),
            log_failures: self.log_failures.load(Ordering::Relaxed),
            snapshot_failures: self.snapshot_failures.load(Ordering::Relaxed),
            queue_drops: self.queue_drops.load(Ordering::Relaxed),
            tracks_evicted: self.tracks_evicted.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fps: f64,
    pub total_detections: u64,
    pub malformed_detections: u64,
    pub alerts_emitted: u64,
    pub voice_scheduled: u64,
    pub voice_completed: u64,
    pub voice_failures: u64,
    pub remote_sent: u64,
    pub remote_failures: u64,
    pub web_pushes: u64,
    pub web_failures: u64,
    pub log_failures: u64,
    pub snapshot_failures: u64,
    pub queue_drops: u64,
    pub tracks_evicted: u64,
    pub elapsed_secs: f64,
}
