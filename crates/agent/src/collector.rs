//! Snapshot sources.
//!
//! A [`SnapshotSource`] produces one [`Snapshot`] per call. Two are provided:
//! [`VllmCollector`] scrapes a live server's `/metrics` endpoint and reads
//! local GPU telemetry, while [`MockCollector`] drives the in-process
//! simulation. Both feed the same parser and assembler.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use throtl_core::{assemble, parse, AssemblerSettings, Snapshot};

use crate::gpu::GpuMonitor;
use crate::mock::MockVllmServer;

/// Errors raised while collecting a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("Metrics request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Metrics endpoint {url} returned HTTP {status}")]
    Status { status: u16, url: String },
}

/// Anything that can produce snapshots on demand.
#[async_trait]
pub trait SnapshotSource: Send {
    /// Collect one snapshot stamped with the current time.
    async fn collect(&mut self) -> Result<Snapshot, CollectError>;

    /// Human-readable description for logs.
    fn name(&self) -> String;
}

/// Normalize a base URL into its `/metrics` endpoint.
///
/// Trailing slashes are dropped and `/metrics` is appended unless the URL
/// already ends with it.
pub fn metrics_url(base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    if base.ends_with("/metrics") {
        base.to_string()
    } else {
        format!("{base}/metrics")
    }
}

// ---------------------------------------------------------------------------
// Live vLLM
// ---------------------------------------------------------------------------

/// Scrapes a running vLLM server.
pub struct VllmCollector {
    client: reqwest::Client,
    url: String,
    settings: AssemblerSettings,
    gpu: GpuMonitor,
}

impl VllmCollector {
    pub fn new(
        base_url: &str,
        settings: AssemblerSettings,
        timeout: Duration,
        gpu: GpuMonitor,
    ) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: metrics_url(base_url),
            settings,
            gpu,
        })
    }

    async fn fetch(&self) -> Result<String, CollectError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SnapshotSource for VllmCollector {
    async fn collect(&mut self) -> Result<Snapshot, CollectError> {
        let body = self.fetch().await?;
        let families = parse(&body);
        tracing::debug!(url = %self.url, families = families.len(), "Scraped metrics");

        let gpu = self.gpu.read();
        Ok(assemble(&families, gpu.as_ref(), &self.settings, Utc::now()))
    }

    fn name(&self) -> String {
        format!("vLLM ({})", self.url)
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Collects from [`MockVllmServer`] without any network access.
pub struct MockCollector {
    server: MockVllmServer,
    settings: AssemblerSettings,
}

impl MockCollector {
    pub fn new(seed: u64, settings: AssemblerSettings) -> Self {
        Self {
            server: MockVllmServer::new(seed),
            settings,
        }
    }
}

#[async_trait]
impl SnapshotSource for MockCollector {
    async fn collect(&mut self) -> Result<Snapshot, CollectError> {
        let scrape = self.server.scrape();
        let families = parse(&scrape.exposition);
        Ok(assemble(&families, Some(&scrape.gpu), &self.settings, Utc::now()))
    }

    fn name(&self) -> String {
        "Mock vLLM (Llama 3 8B on simulated RTX 4090)".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
