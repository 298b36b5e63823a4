// src/event_log.rs
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::types::{utc_compact, AlertEvent};

const HEADER: &str = "timestamp,label,confidence,track_id,artifact_path";

/// Append-only CSV log of emitted alerts. Every append is flushed and
/// synced before returning, so a crash loses at most the in-flight row.
pub struct EventLog {
    file: File,
    path: PathBuf,
}

impl EventLog {
    /// Opens (or creates) the log. The header goes in only when the file is
    /// new or empty, so reopening an existing log keeps appending rows.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
        }
        let needs_header = match fs::metadata(path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open event log {}", path.display()))?;
        if needs_header {
            writeln!(file, "{}", HEADER)
                .with_context(|| format!("failed to write header to {}", path.display()))?;
            file.flush()?;
        }
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Writes one alert row and makes it durable before returning.
    pub fn append(&mut self, event: &AlertEvent) -> Result<()> {
        writeln!(
            self.file,
            "{},{},{:.3},{},{}",
            utc_compact(event.timestamp),
            event.label,
            event.confidence,
            event.track_id,
            event.artifact_path.display()
        )
        .context("failed to write event log row")?;
        self.file.flush().context("failed to flush event log")?;
        self.file.sync_data().context("failed to sync event log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn sample_event(confidence: f32) -> AlertEvent {
        AlertEvent {
            timestamp: 1_700_000_000.0,
            label: "person".to_string(),
            confidence,
            track_id: 5,
            bbox: BoundingBox::new(10, 10, 50, 80),
            artifact_path: PathBuf::from("detections/person5_90.jpg"),
        }
    }

    #[test]
    fn test_row_format_matches_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        let mut log = EventLog::open(&path).unwrap();
        log.append(&sample_event(0.9)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], HEADER);

        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[0], utc_compact(1_700_000_000.0));
        assert_eq!(fields[1], "person");
        assert_eq!(fields[2], "0.900");
        assert_eq!(fields[3], "5");
        assert_eq!(fields[4], "detections/person5_90.jpg");
    }

    #[test]
    fn test_header_written_once_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("log.csv");
        {
            let mut log = EventLog::open(&path).unwrap();
            log.append(&sample_event(0.9)).unwrap();
        }
        {
            let mut log = EventLog::open(&path).unwrap();
            log.append(&sample_event(0.5)).unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let headers = contents.lines().filter(|l| *l == HEADER).count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 3);
    }
}
