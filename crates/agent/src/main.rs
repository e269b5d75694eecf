//! `throtl-agent` -- LLM inference telemetry monitor.
//!
//! Periodically scrapes a vLLM server's `/metrics` endpoint (or a built-in
//! simulation), assembles a snapshot, and logs health findings and config
//! suggestions. See [`throtl_agent::config`] for the environment variables.

use throtl_agent::collector::{MockCollector, SnapshotSource, VllmCollector};
use throtl_agent::config::{AgentConfig, Source};
use throtl_agent::gpu::GpuMonitor;
use throtl_agent::runner::{self, RunSettings};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "throtl_agent=info,throtl_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let mut source: Box<dyn SnapshotSource> = match &config.source {
        Source::Vllm { url } => {
            let gpu = GpuMonitor::new(config.gpu_index);
            tracing::info!(gpu_available = gpu.is_available(), "GPU detection complete");
            let collector =
                VllmCollector::new(url, config.assembler.clone(), config.request_timeout, gpu)
                    .unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Failed to build HTTP client");
                        std::process::exit(1);
                    });
            Box::new(collector)
        }
        Source::Mock { seed } => Box::new(MockCollector::new(*seed, config.assembler.clone())),
    };

    tracing::info!(
        source = %source.name(),
        cost_per_hour = config.assembler.cost_per_hour,
        sla_target_ms = config.assembler.sla_target_ms,
        max_batch_size = config.assembler.max_batch_size,
        "Starting throtl-agent",
    );

    let settings = RunSettings {
        interval: config.interval,
        history_len: config.history_len,
        max_failures: config.max_failures,
        max_ticks: config.max_ticks,
        compare_window: config.compare_window,
    };

    match runner::run(source.as_mut(), settings).await {
        Ok(summary) => {
            tracing::info!(
                ticks = summary.ticks,
                collected = summary.collected,
                failures = summary.failures,
                "Collection finished",
            );
            if let Some(report) = summary.comparison {
                for delta in &report.deltas {
                    tracing::info!(
                        metric = %delta.name,
                        before = delta.before,
                        after = delta.after,
                        delta_pct = delta.delta_pct,
                        improved = ?delta.improved,
                        "Window comparison",
                    );
                }
                tracing::info!(summary = %report.summary, "Comparison verdict");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Collection aborted");
            std::process::exit(1);
        }
    }
}
