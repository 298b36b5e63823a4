// src/types.rs
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Axis-aligned box in pixel coordinates. Serialized as `[x1, y1, x2, y2]`
/// to match the scenario files and the web payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Integer center of the box, the point that goes onto a track's trail.
    pub fn center(&self) -> (i32, i32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}

impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x1, self.y1, self.x2, self.y2].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BoundingBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let [x1, y1, x2, y2] = <[i32; 4]>::deserialize(deserializer)?;
        Ok(Self { x1, y1, x2, y2 })
    }
}

/// One tracked object in one frame, as handed over by the tracker adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedDetection {
    pub track_id: i64,
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl TrackedDetection {
    /// Upstream trackers occasionally emit garbage rows. A detection with an
    /// empty label or a non-finite confidence is skipped while the rest of
    /// the frame is still processed.
    pub fn is_malformed(&self) -> bool {
        self.label.trim().is_empty() || !self.confidence.is_finite()
    }
}

/// A single RGB8 frame plus the pipeline clock at capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: u64,
    /// Epoch seconds. Replay feeds a simulated clock, live capture the wall clock.
    pub timestamp: f64,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// An alert emitted by the decision engine for one track.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub timestamp: f64,
    pub label: String,
    pub confidence: f32,
    pub track_id: i64,
    pub bbox: BoundingBox,
    /// Where the frame snapshot for this alert gets written.
    pub artifact_path: PathBuf,
}

// ============================================================================
// Clock helpers
// ============================================================================

/// Current wall clock as epoch seconds.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Compact UTC stamp used in artifact names and log rows, e.g. `20260825T141503Z`.
pub fn utc_compact(ts: f64) -> String {
    match DateTime::from_timestamp(ts as i64, 0) {
        Some(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
        None => format!("{ts:.0}"),
    }
}

/// `HH:MM:SS` form of a timestamp, used in alert captions.
pub fn utc_hms(ts: f64) -> String {
    match DateTime::from_timestamp(ts as i64, 0) {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => format!("{ts:.0}"),
    }
}
