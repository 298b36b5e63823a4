// src/dispatch/telegram.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::metrics::PipelineMetrics;
use crate::types::{utc_hms, AlertEvent};

use super::queue::DispatchQueue;

/// Minimum payload the remote channel needs from one alert.
#[derive(Debug, Clone)]
pub struct RemoteAlert {
    pub timestamp: f64,
    pub label: String,
    pub confidence: f32,
    pub track_id: i64,
    pub artifact_path: PathBuf,
}

impl From<&AlertEvent> for RemoteAlert {
    fn from(event: &AlertEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            label: event.label.clone(),
            confidence: event.confidence,
            track_id: event.track_id,
            artifact_path: event.artifact_path.clone(),
        }
    }
}

/// Posts the alert snapshot to a Telegram chat via `sendPhoto`. One attempt
/// per alert inside a 10s request budget; failures are logged and dropped.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
    metrics: PipelineMetrics,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig, metrics: PipelineMetrics) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(config.timeout_seconds)
            .unwrap_or(Duration::from_secs(10));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build telegram http client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            metrics,
        })
    }

    /// Worker loop: drains the queue until it closes.
    pub fn spawn(self, queue: Arc<DispatchQueue<RemoteAlert>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(alert) = queue.pop().await {
                self.deliver(&alert).await;
            }
            debug!("telegram worker drained and stopped");
        })
    }

    async fn deliver(&self, alert: &RemoteAlert) {
        match self.send_photo(alert).await {
            Ok(()) => {
                info!("🌐 alert photo sent for {}#{}", alert.label, alert.track_id);
                self.metrics.inc(&self.metrics.remote_sent);
            }
            Err(e) => {
                warn!(
                    "telegram delivery failed for {}#{}: {:#}",
                    alert.label, alert.track_id, e
                );
                self.metrics.inc(&self.metrics.remote_failures);
            }
        }
    }

    async fn send_photo(&self, alert: &RemoteAlert) -> Result<()> {
        let photo = tokio::fs::read(&alert.artifact_path).await.with_context(|| {
            format!("failed to read artifact {}", alert.artifact_path.display())
        })?;
        let file_name = alert
            .artifact_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "alert.jpg".to_string());

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", build_caption(alert))
            .part(
                "photo",
                Part::bytes(photo)
                    .file_name(file_name)
                    .mime_str("image/jpeg")
                    .context("invalid photo mime type")?,
            );

        let url = format!("{}/bot{}/sendPhoto", self.api_base, self.bot_token);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("sendPhoto request failed")?;
        if !response.status().is_success() {
            bail!("telegram returned {}", response.status());
        }
        Ok(())
    }
}

/// Caption shown with the alert photo.
fn build_caption(alert: &RemoteAlert) -> String {
    format!(
        "🚨 {} detected!\nConfidence: {:.2}\nID: {}\nTime: {}",
        capitalize(&alert.label),
        alert.confidence,
        alert.track_id,
        utc_hms(alert.timestamp)
    )
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
