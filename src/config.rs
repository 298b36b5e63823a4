// src/config.rs
use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub tracks: TrackRetentionConfig,
    pub voice: VoiceConfig,
    pub telegram: TelegramConfig,
    pub web: WebConfig,
    pub output: OutputConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Class labels the pipeline reacts to. Anything else is ignored outright.
    pub classes: Vec<String>,
    /// Minimum confidence the tracker adapter lets through.
    pub confidence_threshold: f32,
    /// Per-track debounce between consecutive alerts, in frame-clock seconds.
    pub cooldown_seconds: f64,
    /// Trail points kept per track, oldest evicted first.
    pub trail_length: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            classes: vec![
                "person".to_string(),
                "boat".to_string(),
                "dog".to_string(),
            ],
            confidence_threshold: 0.4,
            cooldown_seconds: 2.0,
            trail_length: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackRetentionConfig {
    /// Idle tracks older than this get evicted from the store.
    pub ttl_seconds: f64,
    /// How often the frame loop runs the eviction sweep.
    pub sweep_interval_seconds: f64,
}

impl Default for TrackRetentionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 600.0,
            sweep_interval_seconds: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub enabled: bool,
    /// External speech program invoked once per utterance.
    pub program: String,
    /// Extra arguments placed before the spoken phrase.
    pub extra_args: Vec<String>,
    /// How many times one announcement repeats its phrase.
    pub repeats: u32,
    /// Pause after each utterance, in seconds.
    pub gap_seconds: f64,
    pub queue_capacity: usize,
    /// Per-class phrase map. Unlisted classes fall back to "<label> detected".
    pub lines: HashMap<String, String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let mut lines = HashMap::new();
        lines.insert(
            "person".to_string(),
            "Hello boss, human detected in flood.".to_string(),
        );
        lines.insert(
            "boat".to_string(),
            "Rescue boat detected on water.".to_string(),
        );
        lines.insert(
            "dog".to_string(),
            "Animal detected, possible survivor nearby.".to_string(),
        );
        Self {
            enabled: true,
            program: "espeak".to_string(),
            extra_args: Vec::new(),
            repeats: 3,
            gap_seconds: 5.0,
            queue_capacity: 4,
            lines,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub api_base: String,
    /// Empty token keeps the channel disabled regardless of `enabled`.
    pub bot_token: String,
    pub chat_id: String,
    pub timeout_seconds: f64,
    pub queue_capacity: usize,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            chat_id: String::new(),
            timeout_seconds: 10.0,
            queue_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Status endpoint receiving board pushes. Empty keeps the board local-only.
    pub update_url: String,
    pub timeout_seconds: f64,
    /// Label that drives the `humanDetected` flag.
    pub alerting_label: String,
    /// How many recent alerting tracks the board retains.
    pub recent_window: usize,
    /// `humanDetected` goes false this many seconds after the last alert.
    pub staleness_seconds: f64,
    pub queue_capacity: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            update_url: "http://localhost:5000/update".to_string(),
            timeout_seconds: 1.0,
            alerting_label: "person".to_string(),
            recent_window: 10,
            staleness_seconds: 3.0,
            queue_capacity: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Snapshot artifacts and the event log land here.
    pub dir: String,
    pub log_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "detections".to_string(),
            log_file: "detections_log.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// JSONL scenario file driving the run.
    pub scenario: String,
    pub frame_width: usize,
    pub frame_height: usize,
    /// Sleep between frames by offset delta instead of replaying flat out.
    pub realtime: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            scenario: "scenarios/flood_drill.jsonl".to_string(),
            frame_width: 1200,
            frame_height: 900,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Env-filter directive for the tracing subscriber.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "flood_sentinel=info".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_expected_tuning() {
        let config = Config::default();
        assert_eq!(config.detection.classes, vec!["person", "boat", "dog"]);
        assert_eq!(config.detection.cooldown_seconds, 2.0);
        assert_eq!(config.detection.trail_length, 20);
        assert_eq!(config.web.staleness_seconds, 3.0);
        assert_eq!(config.web.recent_window, 10);
        assert_eq!(config.voice.repeats, 3);
        assert_eq!(
            config.voice.lines.get("person").map(String::as_str),
            Some("Hello boss, human detected in flood.")
        );
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "detection:").unwrap();
        writeln!(file, "  cooldown_seconds: 5.5").unwrap();
        writeln!(file, "web:").unwrap();
        writeln!(file, "  update_url: \"\"").unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.detection.cooldown_seconds, 5.5);
        // untouched fields keep their defaults
        assert_eq!(config.detection.trail_length, 20);
        assert!(config.web.update_url.is_empty());
        assert_eq!(config.telegram.timeout_seconds, 10.0);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(Config::load("/no/such/config.yaml").is_err());
    }
}
