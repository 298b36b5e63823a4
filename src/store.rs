// src/store.rs
use std::collections::{HashMap, VecDeque};

/// Persistent state for one track, kept across frames.
#[derive(Debug, Clone)]
pub struct TrackRecord {
    /// Frame-clock time of the most recent alert, `None` until the first one.
    pub last_alert: Option<f64>,
    /// Recent box centers, oldest first.
    pub trail: VecDeque<(i32, i32)>,
    /// Latched once a voice announcement was scheduled for this track.
    /// Never re-arms for the lifetime of the record.
    pub voice_triggered: bool,
    /// Frame-clock time this track was last observed, drives eviction.
    pub last_seen: f64,
}

impl TrackRecord {
    fn new(now: f64) -> Self {
        Self {
            last_alert: None,
            trail: VecDeque::new(),
            voice_triggered: false,
            last_seen: now,
        }
    }
}

/// All per-track state the pipeline holds, keyed by tracker id.
/// Single-owner: lives inside the decision engine, no locking anywhere.
pub struct TrackStore {
    tracks: HashMap<i64, TrackRecord>,
    trail_length: usize,
}

impl TrackStore {
    pub fn new(trail_length: usize) -> Self {
        Self {
            tracks: HashMap::new(),
            trail_length,
        }
    }

    /// Returns the record for `track_id`, inserting a fresh one on first
    /// sight, and touches its activity time.
    pub fn get_or_create(&mut self, track_id: i64, now: f64) -> &TrackRecord {
        let record = self
            .tracks
            .entry(track_id)
            .or_insert_with(|| TrackRecord::new(now));
        record.last_seen = now;
        record
    }

    /// Pushes a box center onto the track's trail, evicting the oldest point
    /// once `trail_length` is reached. O(1).
    pub fn append_trail_point(&mut self, track_id: i64, point: (i32, i32)) {
        if self.trail_length == 0 {
            return;
        }
        if let Some(record) = self.tracks.get_mut(&track_id) {
            while record.trail.len() >= self.trail_length {
                record.trail.pop_front();
            }
            record.trail.push_back(point);
        }
    }

    pub fn mark_alerted(&mut self, track_id: i64, timestamp: f64) {
        if let Some(record) = self.tracks.get_mut(&track_id) {
            record.last_alert = Some(timestamp);
        }
    }

    /// Idempotent; repeated calls leave the latch set.
    pub fn mark_voice_triggered(&mut self, track_id: i64) {
        if let Some(record) = self.tracks.get_mut(&track_id) {
            record.voice_triggered = true;
        }
    }

    pub fn get(&self, track_id: i64) -> Option<&TrackRecord> {
        self.tracks.get(&track_id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drops every track idle for longer than `ttl_seconds` and returns how
    /// many were removed. Keeps the store bounded on long runs.
    pub fn evict_stale(&mut self, now: f64, ttl_seconds: f64) -> usize {
        let before = self.tracks.len();
        self.tracks
            .retain(|_, record| now - record.last_seen <= ttl_seconds);
        before - self.tracks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_starts_fresh() {
        let mut store = TrackStore::new(20);
        let record = store.get_or_create(5, 100.0);
        assert!(record.last_alert.is_none());
        assert!(record.trail.is_empty());
        assert!(!record.voice_triggered);
        assert_eq!(record.last_seen, 100.0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_trail_keeps_most_recent_points_in_order() {
        let mut store = TrackStore::new(20);
        store.get_or_create(1, 0.0);
        for i in 1..=25 {
            store.append_trail_point(1, (i, i));
        }
        let trail = &store.get(1).unwrap().trail;
        assert_eq!(trail.len(), 20);
        let points: Vec<(i32, i32)> = trail.iter().copied().collect();
        let expected: Vec<(i32, i32)> = (6..=25).map(|i| (i, i)).collect();
        assert_eq!(points, expected);
    }

    #[test]
    fn test_zero_trail_length_stores_nothing() {
        let mut store = TrackStore::new(0);
        store.get_or_create(1, 0.0);
        store.append_trail_point(1, (3, 4));
        assert!(store.get(1).unwrap().trail.is_empty());
    }

    #[test]
    fn test_voice_latch_is_idempotent() {
        let mut store = TrackStore::new(20);
        store.get_or_create(9, 0.0);
        store.mark_voice_triggered(9);
        store.mark_voice_triggered(9);
        assert!(store.get(9).unwrap().voice_triggered);
    }

    #[test]
    fn test_mark_alerted_records_timestamp() {
        let mut store = TrackStore::new(20);
        store.get_or_create(2, 10.0);
        store.mark_alerted(2, 10.5);
        assert_eq!(store.get(2).unwrap().last_alert, Some(10.5));
    }

    #[test]
    fn test_evict_stale_drops_only_idle_tracks() {
        let mut store = TrackStore::new(20);
        store.get_or_create(1, 0.0);
        store.get_or_create(2, 500.0);
        store.get_or_create(3, 990.0);

        let evicted = store.evict_stale(1000.0, 600.0);
        assert_eq!(evicted, 1);
        assert!(store.get(1).is_none());
        assert!(store.get(2).is_some());
        assert!(store.get(3).is_some());
    }

    #[test]
    fn test_activity_touch_defers_eviction() {
        let mut store = TrackStore::new(20);
        store.get_or_create(1, 0.0);
        store.get_or_create(1, 900.0);
        assert_eq!(store.evict_stale(1000.0, 600.0), 0);
        assert_eq!(store.len(), 1);
    }
}
