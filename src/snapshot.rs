// src/snapshot.rs
use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageBuffer, RgbImage};

use crate::types::{utc_compact, Frame};

const JPEG_QUALITY: u8 = 80;

/// Artifact file name for an alert: label, track id, compact UTC stamp and
/// confidence percentage, e.g. `person520260825T141503Z_82.jpg`.
pub fn artifact_name(label: &str, track_id: i64, timestamp: f64, confidence: f32) -> String {
    format!(
        "{}{}{}_{}.jpg",
        label,
        track_id,
        utc_compact(timestamp),
        (confidence * 100.0).round() as i32
    )
}

/// Encode raw RGB bytes into a JPEG.
fn encode_rgb_to_jpeg(rgb_data: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let img: RgbImage = ImageBuffer::from_raw(width as u32, height as u32, rgb_data.to_vec())
        .context("frame buffer does not match its stated dimensions")?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
    img.write_with_encoder(encoder).context("jpeg encode failed")?;

    Ok(buf.into_inner())
}

/// Writes the alert snapshot for `frame` to `path`, creating the output
/// directory as needed. A failure here must not kill the alert path; the
/// caller logs a warning and moves on.
pub fn write_jpeg(frame: &Frame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create artifact dir {}", parent.display()))?;
    }
    let jpeg = encode_rgb_to_jpeg(&frame.data, frame.width, frame.height)?;
    fs::write(path, jpeg)
        .with_context(|| format!("failed to write artifact {}", path.display()))?;
    Ok(())
}
