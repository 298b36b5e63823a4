// src/engine.rs
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DetectionConfig;
use crate::snapshot;
use crate::store::TrackStore;
use crate::types::{AlertEvent, TrackedDetection};

/// One voice announcement to schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceRequest {
    pub label: String,
    pub track_id: i64,
}

/// Everything one frame decided. The caller performs the side effects.
#[derive(Debug, Default)]
pub struct FrameDecisions {
    pub alerts: Vec<AlertEvent>,
    pub voice: Vec<VoiceRequest>,
    pub malformed: usize,
}

/// Per-frame decision logic: class filter, trail upkeep, voice latch and
/// alert cooldown, in that order. No I/O happens in here; the engine
/// cannot fail mid-frame.
pub struct AlertEngine {
    store: TrackStore,
    classes: HashSet<String>,
    cooldown_seconds: f64,
    artifact_dir: PathBuf,
}

impl AlertEngine {
    pub fn new(detection: &DetectionConfig, artifact_dir: &Path) -> Self {
        Self {
            store: TrackStore::new(detection.trail_length),
            classes: detection.classes.iter().cloned().collect(),
            cooldown_seconds: detection.cooldown_seconds,
            artifact_dir: artifact_dir.to_path_buf(),
        }
    }

    /// Runs the fixed decision order over one frame worth of detections.
    /// `now` is the frame clock in epoch seconds.
    pub fn process_frame(&mut self, detections: &[TrackedDetection], now: f64) -> FrameDecisions {
        let mut decisions = FrameDecisions::default();

        for detection in detections {
            if !self.classes.contains(&detection.label) {
                continue;
            }
            if detection.is_malformed() {
                debug!(
                    "skipping malformed detection (track {}, label {:?})",
                    detection.track_id, detection.label
                );
                decisions.malformed += 1;
                continue;
            }

            let record = self.store.get_or_create(detection.track_id, now);
            let voice_pending = !record.voice_triggered;
            let last_alert = record.last_alert;

            self.store
                .append_trail_point(detection.track_id, detection.bbox.center());

            if voice_pending {
                // latch first, so nothing downstream can schedule it twice
                self.store.mark_voice_triggered(detection.track_id);
                decisions.voice.push(VoiceRequest {
                    label: detection.label.clone(),
                    track_id: detection.track_id,
                });
            }

            let elapsed = match last_alert {
                Some(ts) => now - ts,
                None => f64::INFINITY,
            };
            if elapsed > self.cooldown_seconds {
                self.store.mark_alerted(detection.track_id, now);
                decisions.alerts.push(AlertEvent {
                    timestamp: now,
                    label: detection.label.clone(),
                    confidence: detection.confidence,
                    track_id: detection.track_id,
                    bbox: detection.bbox,
                    artifact_path: self.artifact_dir.join(snapshot::artifact_name(
                        &detection.label,
                        detection.track_id,
                        now,
                        detection.confidence,
                    )),
                });
            }
        }

        decisions
    }

    /// How many tracks the store currently holds.
    pub fn track_count(&self) -> usize {
        self.store.len()
    }

    /// Sweeps idle tracks out of the store. Returns the eviction count.
    pub fn evict_stale(&mut self, now: f64, ttl_seconds: f64) -> usize {
        self.store.evict_stale(now, ttl_seconds)
    }
}
