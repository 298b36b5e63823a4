// src/dispatch/mod.rs
//
// The three side channels: voice announcer, remote image alert, web status.
// Each one is a bounded queue plus a single worker task. The frame loop
// only ever enqueues; a slow or broken channel can neither block nor fail
// the producer.

pub mod queue;
pub mod telegram;
pub mod voice;
pub mod web;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::VoiceRequest;
use crate::metrics::PipelineMetrics;
use crate::status::{StatusBoard, WebUpdate};

use queue::DispatchQueue;
use telegram::{RemoteAlert, TelegramNotifier};
use voice::VoiceAnnouncer;
use web::WebPublisher;

pub struct Dispatchers {
    voice: Option<Arc<DispatchQueue<VoiceRequest>>>,
    remote: Option<Arc<DispatchQueue<RemoteAlert>>>,
    web: Arc<DispatchQueue<WebUpdate>>,
    workers: Vec<JoinHandle<()>>,
    metrics: PipelineMetrics,
}

impl Dispatchers {
    /// Builds the queues and spawns one worker per enabled channel. The web
    /// worker always runs so the status board stays current even with no
    /// push endpoint configured.
    pub fn start(
        config: &Config,
        board: Arc<StatusBoard>,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let mut workers = Vec::new();

        let voice = if config.voice.enabled && !config.voice.program.is_empty() {
            let queue = Arc::new(DispatchQueue::new("voice", config.voice.queue_capacity));
            let announcer = VoiceAnnouncer::new(&config.voice, metrics.clone());
            workers.push(announcer.spawn(queue.clone()));
            info!("✓ Voice channel ready ({})", config.voice.program);
            Some(queue)
        } else {
            info!("Voice channel disabled");
            None
        };

        let remote = if config.telegram.enabled && !config.telegram.bot_token.is_empty() {
            let queue = Arc::new(DispatchQueue::new("telegram", config.telegram.queue_capacity));
            let notifier = TelegramNotifier::new(&config.telegram, metrics.clone())?;
            workers.push(notifier.spawn(queue.clone()));
            info!("✓ Telegram channel ready");
            Some(queue)
        } else {
            info!("Telegram channel disabled");
            None
        };

        let web = Arc::new(DispatchQueue::new("web", config.web.queue_capacity));
        let publisher = WebPublisher::new(&config.web, board, metrics.clone())?;
        workers.push(publisher.spawn(web.clone()));
        if config.web.update_url.is_empty() {
            info!("✓ Status board ready (no push endpoint)");
        } else {
            info!("✓ Status board ready, pushing to {}", config.web.update_url);
        }

        Ok(Self {
            voice,
            remote,
            web,
            workers,
            metrics,
        })
    }

    pub fn announce(&self, request: VoiceRequest) {
        if let Some(queue) = &self.voice {
            queue.push(request);
            self.metrics.inc(&self.metrics.voice_scheduled);
        }
    }

    pub fn send_alert(&self, alert: RemoteAlert) {
        if let Some(queue) = &self.remote {
            queue.push(alert);
        }
    }

    pub fn publish(&self, update: WebUpdate) {
        self.web.push(update);
    }

    /// Closes every queue and waits up to `grace` for the workers to drain
    /// what is pending. Whatever does not drain gets reported and left
    /// behind; at-most-once delivery makes that safe.
    pub async fn shutdown(self, grace: Duration) {
        if let Some(queue) = &self.voice {
            queue.close();
        }
        if let Some(queue) = &self.remote {
            queue.close();
        }
        self.web.close();

        let deadline = Instant::now() + grace;
        for worker in self.workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match timeout(remaining, worker).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("dispatch worker panicked: {}", e),
                Err(_) => warn!("dispatch worker did not drain within the grace period"),
            }
        }

        let dropped = self.voice.as_ref().map(|q| q.dropped()).unwrap_or(0)
            + self.remote.as_ref().map(|q| q.dropped()).unwrap_or(0)
            + self.web.dropped();
        self.metrics.queue_drops.store(dropped, Ordering::Relaxed);

        let pending = self.voice.as_ref().map(|q| q.pending()).unwrap_or(0)
            + self.remote.as_ref().map(|q| q.pending()).unwrap_or(0)
            + self.web.pending();
        if pending > 0 {
            warn!("{} dispatch item(s) left undelivered at shutdown", pending);
        }
    }
}
