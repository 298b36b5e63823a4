// src/tracker.rs
use anyhow::Result;

use crate::types::{Frame, TrackedDetection};

/// Seam to the external detector + tracker. The pipeline consumes whatever
/// comes out of here and never runs inference itself; confidence
/// thresholding is the adapter's business. An empty result simply means the
/// frame decides nothing.
pub trait TrackerAdapter {
    fn track(&mut self, frame: &Frame) -> Result<Vec<TrackedDetection>>;
}
