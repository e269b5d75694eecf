//! Health rules over the current snapshot and its recent history.
//!
//! Each rule encodes a relationship a GPU performance engineer would look
//! for and emits at most one [`Recommendation`]. Rules run in a fixed
//! order; the result is sorted by severity with that order breaking ties.

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Batch utilization below which an idle batch is reported.
pub const LOW_BATCH_UTILIZATION: f64 = 0.25;
/// Batch utilization above which a full batch is reported.
pub const FULL_BATCH_UTILIZATION: f64 = 0.90;

/// KV cache usage that is critical.
pub const CACHE_CRITICAL: f64 = 0.92;
/// KV cache usage that warrants a warning.
pub const CACHE_WARNING: f64 = 0.80;

/// Waiting requests that are critical.
pub const QUEUE_CRITICAL: u32 = 10;
/// Waiting requests that warrant a warning.
pub const QUEUE_WARNING: u32 = 5;

/// TTFT p95 in milliseconds that is critical.
pub const TTFT_CRITICAL_MS: f64 = 500.0;
/// TTFT p95 in milliseconds that warrants a warning.
pub const TTFT_WARNING_MS: f64 = 250.0;

/// TBT p95 in milliseconds that warrants a warning.
pub const TBT_WARNING_MS: f64 = 100.0;

/// GPU utilization below which a busy server counts as underutilizing it.
pub const GPU_UNDERUTILIZED: f64 = 0.30;

/// Throughput (tokens/sec) below which cost efficiency is checked.
pub const LOW_THROUGHPUT_TPS: f64 = 20.0;
/// Cost per 1K tokens above which low throughput is reported.
pub const HIGH_COST_PER_1K: f64 = 0.01;

/// Minimum history length before the trend rule runs.
pub const TREND_MIN_HISTORY: usize = 5;
/// Relative TTFT increase over the oldest third of history that is flagged.
pub const TREND_INCREASE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How urgent a recommendation is. Ordered `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Area of the server a recommendation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Batching,
    Cache,
    Latency,
    Cost,
    Utilization,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batching => "batching",
            Self::Cache => "cache",
            Self::Latency => "latency",
            Self::Cost => "cost",
            Self::Utilization => "utilization",
        }
    }
}

/// A single finding from the health rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub severity: Severity,
    pub category: Category,
    pub title: String,
    pub detail: String,
    /// Suggested vLLM flag or config change, if one applies.
    pub config_hint: Option<String>,
}

impl Recommendation {
    fn new(severity: Severity, category: Category, title: &str, detail: String) -> Self {
        Self {
            severity,
            category,
            title: title.to_string(),
            detail,
            config_hint: None,
        }
    }

    fn with_hint(mut self, hint: &str) -> Self {
        self.config_hint = Some(hint.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Run every rule against `current` and, when long enough, `history`.
///
/// The result is sorted critical first, then warning, then info.
pub fn analyze(current: &Snapshot, history: &[Snapshot]) -> Vec<Recommendation> {
    let mut recs = Vec::new();

    check_batch_utilization(current, &mut recs);
    check_cache_pressure(current, &mut recs);
    check_queue_depth(current, &mut recs);
    check_ttft(current, &mut recs);
    check_tbt(current, &mut recs);
    check_gpu_underutilization(current, &mut recs);
    check_cost_efficiency(current, &mut recs);
    check_ttft_trend(current, history, &mut recs);

    // Stable sort keeps rule order within a severity.
    recs.sort_by_key(|r| std::cmp::Reverse(r.severity));
    recs
}

fn check_batch_utilization(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    let Some(util) = snap.batch_utilization() else {
        return;
    };

    if util < LOW_BATCH_UTILIZATION && snap.requests_waiting == 0 {
        recs.push(
            Recommendation::new(
                Severity::Info,
                Category::Batching,
                "Low batch utilization with empty queue",
                format!(
                    "Batch utilization is {:.0}% with no requests waiting. \
                     The GPU has capacity for larger batches.",
                    util * 100.0
                ),
            )
            .with_hint("--max-num-seqs (increase to allow more concurrent sequences)"),
        );
    } else if util > FULL_BATCH_UTILIZATION && snap.requests_waiting > 0 {
        recs.push(
            Recommendation::new(
                Severity::Warning,
                Category::Batching,
                "Batch is full with requests queued",
                format!(
                    "Running at {:.0}% batch capacity with {} requests waiting. \
                     Throughput is capped.",
                    util * 100.0,
                    snap.requests_waiting
                ),
            )
            .with_hint("--max-num-seqs (increase if VRAM allows)"),
        );
    }
}

fn check_cache_pressure(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    let usage = snap.cache_usage;

    if usage > CACHE_CRITICAL {
        recs.push(
            Recommendation::new(
                Severity::Critical,
                Category::Cache,
                "KV cache near full",
                format!(
                    "KV cache at {:.0}%. New requests will stall or get evicted. \
                     This directly impacts latency and throughput.",
                    usage * 100.0
                ),
            )
            .with_hint(
                "--gpu-memory-utilization (increase), --max-model-len (decrease), \
                 or --enable-prefix-caching",
            ),
        );
    } else if usage > CACHE_WARNING {
        recs.push(
            Recommendation::new(
                Severity::Warning,
                Category::Cache,
                "KV cache pressure building",
                format!(
                    "KV cache at {:.0}%. Not critical yet, but approaching the point \
                     where eviction starts hurting performance.",
                    usage * 100.0
                ),
            )
            .with_hint("--enable-prefix-caching (reuse common prefixes to save cache space)"),
        );
    }
}

fn check_queue_depth(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    let waiting = snap.requests_waiting;

    if waiting > QUEUE_CRITICAL {
        recs.push(Recommendation::new(
            Severity::Critical,
            Category::Latency,
            "Request queue backup",
            format!(
                "{waiting} requests waiting. Users are experiencing queuing delays. \
                 Either increase throughput or add capacity."
            ),
        ));
    } else if waiting > QUEUE_WARNING {
        recs.push(Recommendation::new(
            Severity::Warning,
            Category::Latency,
            "Queue building",
            format!("{waiting} requests waiting. Queue is growing, watch for latency impact."),
        ));
    }
}

fn check_ttft(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    let ttft_ms = snap.ttft_p95_ms();

    if ttft_ms > TTFT_CRITICAL_MS {
        recs.push(Recommendation::new(
            Severity::Critical,
            Category::Latency,
            "High time-to-first-token",
            format!(
                "TTFT p95 is {ttft_ms:.0}ms. Users are waiting over half a second before \
                 seeing any output. Check queue depth and cache pressure."
            ),
        ));
    } else if ttft_ms > TTFT_WARNING_MS {
        recs.push(Recommendation::new(
            Severity::Warning,
            Category::Latency,
            "Elevated time-to-first-token",
            format!(
                "TTFT p95 is {ttft_ms:.0}ms. Noticeable to users. Often caused by KV cache \
                 contention or a prompt processing bottleneck."
            ),
        ));
    }
}

fn check_tbt(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    let tbt_ms = snap.tbt_p95_ms();

    if tbt_ms > TBT_WARNING_MS {
        recs.push(Recommendation::new(
            Severity::Warning,
            Category::Latency,
            "Slow token generation",
            format!(
                "Time per output token p95 is {tbt_ms:.0}ms. Streaming responses will feel \
                 sluggish. Usually means the GPU is overloaded."
            ),
        ));
    }
}

fn check_gpu_underutilization(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    // Zeroed GPU fields mean no telemetry, not an idle GPU.
    if !snap.has_gpu_telemetry() {
        return;
    }

    if snap.gpu_utilization < GPU_UNDERUTILIZED && snap.requests_running > 0 {
        recs.push(Recommendation::new(
            Severity::Info,
            Category::Utilization,
            "GPU underutilized",
            format!(
                "GPU at {:.0}% utilization with {} active requests. You could handle more \
                 concurrent load or use a smaller GPU.",
                snap.gpu_utilization * 100.0,
                snap.requests_running
            ),
        ));
    }
}

fn check_cost_efficiency(snap: &Snapshot, recs: &mut Vec<Recommendation>) {
    if snap.tokens_per_second < LOW_THROUGHPUT_TPS && snap.cost_per_1k_tokens > HIGH_COST_PER_1K {
        recs.push(Recommendation::new(
            Severity::Info,
            Category::Cost,
            "Low throughput driving up cost",
            format!(
                "Generating {:.0} tokens/sec at ${:.4}/1K tokens. Improving batch \
                 utilization or reducing queue stalls would lower cost.",
                snap.tokens_per_second, snap.cost_per_1k_tokens
            ),
        ));
    }
}

/// Flag TTFT p95 climbing relative to the oldest third of `history`.
fn check_ttft_trend(current: &Snapshot, history: &[Snapshot], recs: &mut Vec<Recommendation>) {
    if history.len() < TREND_MIN_HISTORY {
        return;
    }

    let oldest = &history[..history.len() / 3];
    let baseline = oldest.iter().map(|s| s.ttft_p95).sum::<f64>() / oldest.len() as f64;
    if baseline == 0.0 {
        return;
    }

    let increase = (current.ttft_p95 - baseline) / baseline;
    if increase > TREND_INCREASE {
        recs.push(Recommendation::new(
            Severity::Warning,
            Category::Latency,
            "TTFT trending upward",
            format!(
                "TTFT p95 has increased ~{:.0}% over the recent window. Likely caused by \
                 growing load or cache pressure.",
                increase * 100.0
            ),
        ));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
