// src/status.rs
use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use crate::config::WebConfig;
use crate::types::{AlertEvent, BoundingBox};

/// Payload the web side consumes, both on push and on query.
/// Field names follow the status endpoint's contract.
#[derive(Debug, Clone, Serialize)]
pub struct StatusPayload {
    #[serde(rename = "humanDetected")]
    pub human_detected: bool,
    pub label: String,
    pub confidence: f32,
    pub track_id: i64,
    pub timestamp: f64,
    pub detections: Vec<BoardEntry>,
}

/// One recent alerting track on the board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardEntry {
    pub label: String,
    pub confidence: f32,
    pub track_id: i64,
    pub bbox: BoundingBox,
}

/// What one dispatched alert contributes to the board.
#[derive(Debug, Clone)]
pub struct WebUpdate {
    pub timestamp: f64,
    pub label: String,
    pub confidence: f32,
    pub track_id: i64,
    pub bbox: BoundingBox,
}

impl From<&AlertEvent> for WebUpdate {
    fn from(event: &AlertEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            label: event.label.clone(),
            confidence: event.confidence,
            track_id: event.track_id,
            bbox: event.bbox,
        }
    }
}

#[derive(Debug, Default)]
struct BoardState {
    entries: VecDeque<BoardEntry>,
    last: Option<LastAlert>,
}

#[derive(Debug, Clone)]
struct LastAlert {
    label: String,
    confidence: f32,
    track_id: i64,
    timestamp: f64,
}

/// The mutable status snapshot, fully encapsulated. Upsert and payload
/// construction happen under one lock acquisition, so the dedup-by-track-id
/// invariant holds no matter who is pushing. The lock is never held across
/// any I/O.
pub struct StatusBoard {
    state: Mutex<BoardState>,
    capacity: usize,
    staleness_seconds: f64,
    alerting_label: String,
}

impl StatusBoard {
    pub fn new(web: &WebConfig) -> Self {
        Self {
            state: Mutex::new(BoardState::default()),
            capacity: web.recent_window,
            staleness_seconds: web.staleness_seconds,
            alerting_label: web.alerting_label.clone(),
        }
    }

    /// Upserts the alerting track into the recent list (replace in place
    /// when the track is already listed, evict the oldest entry at
    /// capacity), records it as the most recent alert, and returns the
    /// payload reflecting the board right after the update.
    pub fn apply(&self, update: WebUpdate) -> StatusPayload {
        let mut state = self.state.lock().unwrap();

        let entry = BoardEntry {
            label: update.label.clone(),
            confidence: update.confidence,
            track_id: update.track_id,
            bbox: update.bbox,
        };
        match state
            .entries
            .iter()
            .position(|e| e.track_id == update.track_id)
        {
            Some(pos) => state.entries[pos] = entry,
            None if self.capacity > 0 => {
                while state.entries.len() >= self.capacity {
                    state.entries.pop_front();
                }
                state.entries.push_back(entry);
            }
            None => {}
        }

        state.last = Some(LastAlert {
            label: update.label,
            confidence: update.confidence,
            track_id: update.track_id,
            timestamp: update.timestamp,
        });

        self.build(&state, update.timestamp)
    }

    /// Payload for a query at time `now`. `humanDetected` is computed here,
    /// never stored, so staleness needs no background timer.
    pub fn status(&self, now: f64) -> StatusPayload {
        let state = self.state.lock().unwrap();
        self.build(&state, now)
    }

    fn build(&self, state: &BoardState, now: f64) -> StatusPayload {
        match &state.last {
            Some(last) => StatusPayload {
                human_detected: last.label == self.alerting_label
                    && now - last.timestamp <= self.staleness_seconds,
                label: last.label.clone(),
                confidence: last.confidence,
                track_id: last.track_id,
                timestamp: last.timestamp,
                detections: state.entries.iter().cloned().collect(),
            },
            None => StatusPayload {
                human_detected: false,
                label: String::new(),
                confidence: 0.0,
                track_id: 0,
                timestamp: 0.0,
                detections: Vec::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> StatusBoard {
        StatusBoard::new(&WebConfig::default())
    }

    fn update(track_id: i64, label: &str, confidence: f32, timestamp: f64) -> WebUpdate {
        WebUpdate {
            timestamp,
            label: label.to_string(),
            confidence,
            track_id,
            bbox: BoundingBox::new(10, 10, 50, 80),
        }
    }

    #[test]
    fn test_empty_board_reports_nothing() {
        let payload = board().status(100.0);
        assert!(!payload.human_detected);
        assert!(payload.label.is_empty());
        assert!(payload.detections.is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let board = board();
        board.apply(update(1, "person", 0.5, 0.0));
        board.apply(update(2, "person", 0.6, 0.1));
        board.apply(update(3, "boat", 0.7, 0.2));
        let payload = board.apply(update(2, "person", 0.99, 0.3));

        assert_eq!(payload.detections.len(), 3);
        // track 2 keeps its slot, only its data changes
        assert_eq!(payload.detections[1].track_id, 2);
        assert_eq!(payload.detections[1].confidence, 0.99);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let board = board();
        for id in 1..=11 {
            board.apply(update(id, "person", 0.5, id as f64));
        }
        let payload = board.status(11.0);
        assert_eq!(payload.detections.len(), 10);
        assert_eq!(payload.detections[0].track_id, 2);
        assert_eq!(payload.detections[9].track_id, 11);
    }

    #[test]
    fn test_staleness_window_boundary() {
        let board = board();
        board.apply(update(5, "person", 0.82, 100.0));

        assert!(board.status(100.0).human_detected);
        assert!(board.status(103.0).human_detected);
        assert!(!board.status(103.1).human_detected);
        // the rest of the payload keeps reporting the last alert
        assert_eq!(board.status(200.0).label, "person");
        assert_eq!(board.status(200.0).track_id, 5);
    }

    #[test]
    fn test_non_alerting_label_never_sets_flag() {
        let board = board();
        let payload = board.apply(update(7, "boat", 0.9, 50.0));
        assert!(!payload.human_detected);
        assert_eq!(payload.label, "boat");
        assert!(!board.status(50.0).human_detected);
    }

    #[test]
    fn test_payload_wire_names() {
        let board = board();
        board.apply(update(1, "person", 0.5, 1.0));
        let json = serde_json::to_string(&board.status(1.0)).unwrap();
        assert!(json.contains("\"humanDetected\":true"));
        assert!(json.contains("\"detections\":["));
        assert!(json.contains("\"bbox\":[10,10,50,80]"));
    }
}
