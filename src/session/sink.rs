use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::Snapshot;
use crate::config::SinkConfig;
use crate::error::{SinkError, SinkResult};

/// Outbound endpoint that upserts snapshots by correlation id.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Deliver one full snapshot.
    async fn upsert(&self, snapshot: &Snapshot) -> SinkResult<()>;
}

/// Posts snapshots as JSON to an HTTP endpoint.
#[derive(Clone)]
pub struct HttpSnapshotSink {
    client: Client,
    url: String,
    timeout_ms: u64,
}

impl HttpSnapshotSink {
    /// Create a new sink client
    pub fn new(config: &SinkConfig) -> SinkResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(SinkError::Http)?;

        Ok(Self {
            client,
            url: config.url.clone(),
            timeout_ms: config.timeout_ms,
        })
    }

    /// Get the endpoint URL (for testing)
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSink for HttpSnapshotSink {
    async fn upsert(&self, snapshot: &Snapshot) -> SinkResult<()> {
        let start = Instant::now();
        debug!(
            correlation_id = %snapshot.correlation_id,
            fields = snapshot.fields.len(),
            "Posting snapshot"
        );

        let response = self
            .client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    SinkError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SinkError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        info!(
            correlation_id = %snapshot.correlation_id,
            latency_ms = start.elapsed().as_millis(),
            "Snapshot upserted"
        );
        Ok(())
    }
}
