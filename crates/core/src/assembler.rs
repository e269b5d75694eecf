//! Snapshot assembly from a parsed exposition.
//!
//! Pure logic: the caller scrapes the server, reads GPU telemetry and picks
//! the timestamp, then passes everything in. Missing metrics default to
//! zero (vLLM versions differ in what they expose), so assembly always
//! succeeds.

use crate::exposition::{counter_value, gauge_value, MetricFamilies};
use crate::gpu::GpuReading;
use crate::metric_names::{
    VLLM_CACHE_USAGE, VLLM_GENERATION_THROUGHPUT, VLLM_GENERATION_TOKENS, VLLM_PROMPT_THROUGHPUT,
    VLLM_PROMPT_TOKENS, VLLM_REQUESTS_RUNNING, VLLM_REQUESTS_WAITING, VLLM_REQUEST_SUCCESS,
    VLLM_TBT_SECONDS, VLLM_TTFT_SECONDS,
};
use crate::quantile::{histogram_fraction_at_or_below, histogram_percentile};
use crate::snapshot::{AssemblerSettings, Snapshot};
use crate::types::Timestamp;

/// Seconds per hour (3600.0).
pub const SECS_PER_HOUR: f64 = 3600.0;
/// Tokens per cost unit.
const TOKENS_PER_UNIT: f64 = 1000.0;

/// The three percentiles recorded per latency class.
const PERCENTILES: [f64; 3] = [0.50, 0.95, 0.99];

/// Build a [`Snapshot`] from parsed families plus caller-supplied context.
///
/// Without `gpu`, utilization and memory fields are zero; consumers use
/// [`Snapshot::has_gpu_telemetry`] to tell that apart from an idle GPU.
pub fn assemble(
    families: &MetricFamilies,
    gpu: Option<&GpuReading>,
    settings: &AssemblerSettings,
    timestamp: Timestamp,
) -> Snapshot {
    let requests_running = as_small_count(gauge_value(families, VLLM_REQUESTS_RUNNING));
    let requests_waiting = as_small_count(gauge_value(families, VLLM_REQUESTS_WAITING));
    let requests_completed = as_count(counter_value(families, VLLM_REQUEST_SUCCESS));

    let prompt_tokens_total = as_count(counter_value(families, VLLM_PROMPT_TOKENS));
    let generation_tokens_total = as_count(counter_value(families, VLLM_GENERATION_TOKENS));

    let prompt_throughput = gauge_value(families, VLLM_PROMPT_THROUGHPUT).unwrap_or(0.0);
    let generation_throughput = gauge_value(families, VLLM_GENERATION_THROUGHPUT).unwrap_or(0.0);
    let tokens_per_second = (prompt_throughput + generation_throughput).max(0.0);

    let cache_usage = as_fraction(gauge_value(families, VLLM_CACHE_USAGE));

    let [ttft_p50, ttft_p95, ttft_p99] = latency_percentiles(families, VLLM_TTFT_SECONDS);
    let [tbt_p50, tbt_p95, tbt_p99] = latency_percentiles(families, VLLM_TBT_SECONDS);

    // vLLM has no batch size metric; running requests approximate occupancy.
    let avg_batch_size = f64::from(requests_running);

    let (gpu_utilization, gpu_memory_used_gb, gpu_memory_total_gb) = match gpu {
        Some(reading) => (
            as_fraction(Some(reading.utilization)),
            as_gigabytes(reading.memory_used_gb),
            as_gigabytes(reading.memory_total_gb),
        ),
        None => (0.0, 0.0, 0.0),
    };

    let cost_per_1k_tokens = cost_per_1k_tokens(settings.cost_per_hour, tokens_per_second);
    let total_tokens = prompt_tokens_total.saturating_add(generation_tokens_total) as f64;
    let cumulative_cost_usd = total_tokens / TOKENS_PER_UNIT * cost_per_1k_tokens;

    let sla_compliance =
        histogram_fraction_at_or_below(families, VLLM_TTFT_SECONDS, settings.sla_target_ms / 1000.0)
            .unwrap_or(0.0);

    Snapshot {
        timestamp,
        requests_running,
        requests_waiting,
        requests_completed,
        prompt_tokens_total,
        generation_tokens_total,
        tokens_per_second,
        ttft_p50,
        ttft_p95,
        ttft_p99,
        tbt_p50,
        tbt_p95,
        tbt_p99,
        cache_usage,
        gpu_utilization,
        gpu_memory_used_gb,
        gpu_memory_total_gb,
        avg_batch_size,
        max_batch_size: settings.max_batch_size,
        cost_per_hour: settings.cost_per_hour,
        cost_per_1k_tokens,
        cumulative_cost_usd,
        sla_target_ms: settings.sla_target_ms,
        sla_compliance,
    }
}

/// Cost of 1K tokens at the given hourly price and throughput.
///
/// Throughput below one token per hour is floored so an idle server yields
/// a large but finite price.
pub fn cost_per_1k_tokens(cost_per_hour: f64, tokens_per_second: f64) -> f64 {
    let tokens_per_hour = f64::max(1.0, tokens_per_second * SECS_PER_HOUR);
    (cost_per_hour / tokens_per_hour) * TOKENS_PER_UNIT
}

fn latency_percentiles(families: &MetricFamilies, name: &str) -> [f64; 3] {
    PERCENTILES.map(|p| {
        histogram_percentile(families, name, p)
            .unwrap_or(0.0)
            .max(0.0)
    })
}

/// Truncate a float reading to a non-negative integer count.
///
/// NaN and non-positive readings count as zero; `+Inf` and anything past
/// `u64::MAX` saturate.
fn as_count(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v > 0.0 => v as u64,
        _ => 0,
    }
}

/// [`as_count`] narrowed to `u32`, saturating rather than wrapping.
fn as_small_count(value: Option<f64>) -> u32 {
    u32::try_from(as_count(value)).unwrap_or(u32::MAX)
}

/// A reading that must lie in `[0, 1]`. Non-finite values count as zero.
fn as_fraction(value: Option<f64>) -> f64 {
    value
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
        .clamp(0.0, 1.0)
}

fn as_gigabytes(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
