// src/replay.rs
//
// Scenario replay: a JSONL file stands in for the camera and the detector,
// one line per frame. Lets the whole pipeline run end to end on a recorded
// detection script with a simulated clock.

use std::collections::HashMap;
use std::fs;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::tracker::TrackerAdapter;
use crate::types::{Frame, TrackedDetection};

/// One line of a scenario file.
#[derive(Debug, Deserialize)]
struct ScenarioLine {
    /// Seconds from scenario start.
    offset: f64,
    #[serde(default)]
    detections: Vec<TrackedDetection>,
}

pub struct Scenario {
    frames: Vec<ScenarioLine>,
}

impl Scenario {
    /// Loads a scenario, skipping malformed lines with a warning. An empty
    /// scenario is a startup error.
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("failed to read scenario {}", path))?;
        let mut frames = Vec::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match serde_json::from_str::<ScenarioLine>(line) {
                Ok(parsed) => frames.push(parsed),
                Err(e) => warn!("skipping malformed scenario line {}: {}", idx + 1, e),
            }
        }
        if frames.is_empty() {
            bail!("scenario {} contains no usable frames", path);
        }
        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Splits the scenario into a frame feed and a scripted tracker, with
    /// frame timestamps anchored at `start`.
    pub fn into_runtime(self, config: &Config, start: f64) -> (ReplayFeed, ScriptedTracker) {
        let mut timestamps = Vec::with_capacity(self.frames.len());
        let mut by_frame = HashMap::new();
        for (i, line) in self.frames.into_iter().enumerate() {
            timestamps.push(start + line.offset);
            if !line.detections.is_empty() {
                by_frame.insert(i as u64, line.detections);
            }
        }
        let feed = ReplayFeed {
            timestamps,
            width: config.replay.frame_width,
            height: config.replay.frame_height,
            next: 0,
        };
        let tracker = ScriptedTracker {
            by_frame,
            confidence_threshold: config.detection.confidence_threshold,
        };
        (feed, tracker)
    }
}

/// Synthesizes flat RGB frames on the scenario's clock.
pub struct ReplayFeed {
    timestamps: Vec<f64>,
    width: usize,
    height: usize,
    next: usize,
}

impl ReplayFeed {
    pub fn next_frame(&mut self) -> Option<Frame> {
        let timestamp = *self.timestamps.get(self.next)?;
        let frame = Frame {
            frame_id: self.next as u64,
            timestamp,
            width: self.width,
            height: self.height,
            data: vec![0x60; self.width * self.height * 3],
        };
        self.next += 1;
        Some(frame)
    }
}

/// Serves the scripted detections for each frame, filtering by confidence
/// the way a live tracker would. Non-finite confidences pass through; the
/// decision engine guards against those itself.
pub struct ScriptedTracker {
    by_frame: HashMap<u64, Vec<TrackedDetection>>,
    confidence_threshold: f32,
}

impl TrackerAdapter for ScriptedTracker {
    fn track(&mut self, frame: &Frame) -> Result<Vec<TrackedDetection>> {
        let Some(detections) = self.by_frame.remove(&frame.frame_id) else {
            return Ok(Vec::new());
        };
        Ok(detections
            .into_iter()
            .filter(|d| !d.confidence.is_finite() || d.confidence >= self.confidence_threshold)
            .collect())
    }
}
