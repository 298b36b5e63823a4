// src/dispatch/web.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::WebConfig;
use crate::metrics::PipelineMetrics;
use crate::status::{StatusBoard, StatusPayload, WebUpdate};

use super::queue::DispatchQueue;

/// Applies each alert to the status board and pushes the resulting payload
/// to the status endpoint inside a 1s budget. The endpoint is best-effort
/// telemetry; with none configured the board alone is maintained.
pub struct WebPublisher {
    client: Client,
    update_url: String,
    board: Arc<StatusBoard>,
    metrics: PipelineMetrics,
}

impl WebPublisher {
    pub fn new(
        config: &WebConfig,
        board: Arc<StatusBoard>,
        metrics: PipelineMetrics,
    ) -> Result<Self> {
        let timeout = Duration::try_from_secs_f64(config.timeout_seconds)
            .unwrap_or(Duration::from_secs(1));
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build web http client")?;
        Ok(Self {
            client,
            update_url: config.update_url.clone(),
            board,
            metrics,
        })
    }

    /// Worker loop: drains the queue until it closes.
    pub fn spawn(self, queue: Arc<DispatchQueue<WebUpdate>>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(update) = queue.pop().await {
                self.deliver(update).await;
            }
            debug!("web worker drained and stopped");
        })
    }

    async fn deliver(&self, update: WebUpdate) {
        // board first; the queryable surface never depends on the endpoint
        let payload = self.board.apply(update);
        if self.update_url.is_empty() {
            return;
        }
        match self.push(&payload).await {
            Ok(()) => {
                debug!("status pushed ({} recent tracks)", payload.detections.len());
                self.metrics.inc(&self.metrics.web_pushes);
            }
            Err(e) => {
                warn!("status push failed: {:#}", e);
                self.metrics.inc(&self.metrics.web_failures);
            }
        }
    }

    async fn push(&self, payload: &StatusPayload) -> Result<()> {
        let response = self
            .client
            .post(&self.update_url)
            .json(payload)
            .send()
            .await
            .context("status update request failed")?;
        if !response.status().is_success() {
            bail!("status endpoint returned {}", response.status());
        }
        Ok(())
    }
}
