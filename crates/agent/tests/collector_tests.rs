//! Integration tests for snapshot sources.
//!
//! HTTP scraping is exercised against a one-shot TCP listener that answers
//! with a canned response, so no vLLM server is needed.

use std::time::Duration;

use assert_matches::assert_matches;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use throtl_agent::collector::{CollectError, MockCollector, SnapshotSource, VllmCollector};
use throtl_agent::gpu::GpuMonitor;
use throtl_agent::mock::MockVllmServer;
use throtl_core::AssemblerSettings;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Serve a single HTTP response on an ephemeral port and return its base URL.
async fn serve_once(status_line: &'static str, body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-type: text/plain; version=0.0.4\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    format!("http://{addr}")
}

fn collector(base_url: &str) -> VllmCollector {
    VllmCollector::new(base_url, AssemblerSettings::default(), TIMEOUT, GpuMonitor::disabled())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Mock source
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mock_collector_produces_snapshots() {
    let mut source: Box<dyn SnapshotSource> =
        Box::new(MockCollector::new(42, AssemblerSettings::default()));

    let first = source.collect().await.unwrap();
    let second = source.collect().await.unwrap();

    assert!(first.tokens_per_second > 0.0);
    assert!(first.has_gpu_telemetry());
    assert_eq!(first.max_batch_size, 16);
    assert!(second.generation_tokens_total > first.generation_tokens_total);
    assert!(source.name().starts_with("Mock vLLM"));
}

#[tokio::test]
async fn mock_collector_uses_settings() {
    let settings = AssemblerSettings {
        cost_per_hour: 4.0,
        sla_target_ms: 200.0,
        max_batch_size: 64,
    };
    let mut source = MockCollector::new(1, settings);
    let snap = source.collect().await.unwrap();
    assert_eq!(snap.cost_per_hour, 4.0);
    assert_eq!(snap.sla_target_ms, 200.0);
    assert_eq!(snap.max_batch_size, 64);
}

// ---------------------------------------------------------------------------
// Live scraping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scrapes_live_endpoint() {
    let body = MockVllmServer::new(5).scrape().exposition;
    let base = serve_once("200 OK", body).await;
    let mut source = collector(&base);

    let snap = source.collect().await.unwrap();
    assert!(snap.requests_running >= 1);
    assert!(snap.tokens_per_second > 0.0);
    assert!(snap.ttft_p50 > 0.0);
    // Disabled GPU monitor leaves hardware fields at zero.
    assert!(!snap.has_gpu_telemetry());
    assert_eq!(snap.gpu_utilization, 0.0);
}

#[tokio::test]
async fn non_success_status_is_error() {
    let base = serve_once("503 Service Unavailable", "loading".to_string()).await;
    let mut source = collector(&base);

    let err = source.collect().await.unwrap_err();
    assert_matches!(err, CollectError::Status { status: 503, ref url } if url.ends_with("/metrics"));
}

#[tokio::test]
async fn unreachable_server_is_request_error() {
    // Bind then drop to get a port with nothing listening.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let mut source = collector(&format!("http://{addr}"));

    assert_matches!(source.collect().await, Err(CollectError::Request(_)));
}

#[tokio::test]
async fn empty_body_yields_zero_snapshot() {
    let base = serve_once("200 OK", String::new()).await;
    let mut source = collector(&base);

    let snap = source.collect().await.unwrap();
    assert_eq!(snap.requests_running, 0);
    assert_eq!(snap.tokens_per_second, 0.0);
    assert_eq!(snap.ttft_p95, 0.0);
}

#[test]
fn collector_name_includes_metrics_url() {
    let source = collector("http://gpu-box:8000/");
    assert_eq!(source.name(), "vLLM (http://gpu-box:8000/metrics)");
}

#[test]
fn gpu_monitor_without_drivers_reads_nothing() {
    let monitor = GpuMonitor::disabled();
    assert!(!monitor.is_available());
    assert!(monitor.read().is_none());
}
