// src/dispatch/voice.rs
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::VoiceConfig;
use crate::engine::VoiceRequest;
use crate::metrics::PipelineMetrics;

use super::queue::DispatchQueue;

/// Hard cap on a single utterance; a wedged speech program must not pin the
/// channel forever.
const UTTERANCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Speaks one phrase per newly seen track, repeating it a configured number
/// of times with a pause after each utterance. One announcement therefore
/// occupies the channel for roughly repeats * gap seconds. Failures are
/// logged and swallowed; nothing reports back into the frame loop.
pub struct VoiceAnnouncer {
    program: String,
    extra_args: Vec<String>,
    lines: HashMap<String, String>,
    repeats: u32,
    gap: Duration,
    metrics: PipelineMetrics,
}

impl VoiceAnnouncer {
    pub fn new(config: &VoiceConfig, metrics: PipelineMetrics) -> Self {
        Self {
            program: config.program.clone(),
            extra_args: config.extra_args.clone(),
            lines: config.lines.clone(),
            repeats: config.repeats.max(1),
            gap: Duration::try_from_secs_f64(config.gap_seconds).unwrap_or(Duration::ZERO),
            metrics,
        }
    }

    /// Worker loop: drains the queue until it closes.
    pub fn spawn(self, queue: Arc<DispatchQueue<VoiceRequest>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = queue.pop().await {
                self.announce(&request).await;
            }
            debug!("voice worker drained and stopped");
        })
    }

    fn phrase_for(&self, label: &str) -> String {
        match self.lines.get(label) {
            Some(line) => line.clone(),
            None => format!("{} detected", label),
        }
    }

    async fn announce(&self, request: &VoiceRequest) {
        let phrase = self.phrase_for(&request.label);
        info!(
            "announcing {}#{}: {:?}",
            request.label, request.track_id, phrase
        );
        let mut failures = 0u32;
        for _ in 0..self.repeats {
            if let Err(e) = self.speak_once(&phrase).await {
                warn!(
                    "utterance failed for {}#{}: {:#}",
                    request.label, request.track_id, e
                );
                self.metrics.inc(&self.metrics.voice_failures);
                failures += 1;
            }
            tokio::time::sleep(self.gap).await;
        }
        if failures == 0 {
            self.metrics.inc(&self.metrics.voice_completed);
        }
        info!(
            "finished {}x announcement for {}#{}",
            self.repeats, request.label, request.track_id
        );
    }

    async fn speak_once(&self, phrase: &str) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.extra_args)
            .arg(phrase)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let status = tokio::time::timeout(UTTERANCE_TIMEOUT, command.status())
            .await
            .context("speech program timed out")?
            .with_context(|| format!("failed to run speech program {:?}", self.program))?;
        if !status.success() {
            bail!("speech program exited with {}", status);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    fn test_config() -> VoiceConfig {
        VoiceConfig {
            program: "/nonexistent/speech-program".to_string(),
            repeats: 2,
            gap_seconds: 0.0,
            ..VoiceConfig::default()
        }
    }

    #[test]
    fn test_phrase_map_with_fallback() {
        let announcer = VoiceAnnouncer::new(&VoiceConfig::default(), PipelineMetrics::new());
        assert_eq!(
            announcer.phrase_for("person"),
            "Hello boss, human detected in flood."
        );
        assert_eq!(announcer.phrase_for("giraffe"), "giraffe detected");
    }

    #[tokio::test]
    async fn test_missing_program_is_swallowed() {
        let metrics = PipelineMetrics::new();
        let announcer = VoiceAnnouncer::new(&test_config(), metrics.clone());

        announcer
            .announce(&VoiceRequest {
                label: "person".to_string(),
                track_id: 1,
            })
            .await;

        assert_eq!(metrics.voice_failures.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.voice_completed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_worker_drains_queue_then_stops() {
        let metrics = PipelineMetrics::new();
        let mut config = test_config();
        config.repeats = 1;
        let announcer = VoiceAnnouncer::new(&config, metrics.clone());

        let queue = Arc::new(DispatchQueue::new("voice", 4));
        let worker = announcer.spawn(queue.clone());
        queue.push(VoiceRequest {
            label: "boat".to_string(),
            track_id: 2,
        });
        queue.close();

        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(metrics.voice_failures.load(Ordering::Relaxed), 1);
    }
}
