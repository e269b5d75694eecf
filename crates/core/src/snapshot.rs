//! Point-in-time inference server readings.
//!
//! A [`Snapshot`] is built once by [`crate::assembler::assemble`] and never
//! mutated afterwards. Latencies are stored in seconds; fractions
//! (cache usage, GPU utilization, SLA compliance) in `[0, 1]`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::threshold_validation::{validate_non_negative, validate_positive_count};
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default GPU rental price in USD per hour.
pub const DEFAULT_COST_PER_HOUR: f64 = 1.0;
/// Default time-to-first-token SLA target in milliseconds.
pub const DEFAULT_SLA_TARGET_MS: f64 = 500.0;
/// Default concurrency cap (`--max-num-seqs`) assumed for the server.
pub const DEFAULT_MAX_BATCH_SIZE: u32 = 16;

// ---------------------------------------------------------------------------
// Assembler settings
// ---------------------------------------------------------------------------

/// Externally configured values the wire format does not carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblerSettings {
    /// GPU cost in USD per hour.
    pub cost_per_hour: f64,
    /// TTFT target used for SLA compliance, milliseconds.
    pub sla_target_ms: f64,
    /// Configured maximum concurrent sequences.
    pub max_batch_size: u32,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            cost_per_hour: DEFAULT_COST_PER_HOUR,
            sla_target_ms: DEFAULT_SLA_TARGET_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

impl AssemblerSettings {
    /// Reject negative or non-finite prices and targets and a zero batch cap.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_non_negative(self.cost_per_hour, "cost_per_hour")?;
        validate_non_negative(self.sla_target_ms, "sla_target_ms")?;
        validate_positive_count(self.max_batch_size, "max_batch_size")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A single normalized reading from an inference server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,

    // Request state
    pub requests_running: u32,
    pub requests_waiting: u32,
    pub requests_completed: u64,

    // Tokens
    pub prompt_tokens_total: u64,
    pub generation_tokens_total: u64,
    pub tokens_per_second: f64,

    // Latency (seconds)
    pub ttft_p50: f64,
    pub ttft_p95: f64,
    pub ttft_p99: f64,
    pub tbt_p50: f64,
    pub tbt_p95: f64,
    pub tbt_p99: f64,

    // GPU / cache
    pub cache_usage: f64,
    pub gpu_utilization: f64,
    pub gpu_memory_used_gb: f64,
    pub gpu_memory_total_gb: f64,

    // Batching
    pub avg_batch_size: f64,
    pub max_batch_size: u32,

    // Cost
    pub cost_per_hour: f64,
    pub cost_per_1k_tokens: f64,
    pub cumulative_cost_usd: f64,
    pub sla_target_ms: f64,
    pub sla_compliance: f64,
}

impl Snapshot {
    /// Whether real GPU telemetry was merged in.
    ///
    /// Missing telemetry is stored as zeros, so an all-zero reading is
    /// treated as absent rather than as an idle GPU.
    pub fn has_gpu_telemetry(&self) -> bool {
        self.gpu_utilization != 0.0 || self.gpu_memory_total_gb != 0.0
    }

    /// Average batch occupancy relative to the cap, `None` when the cap is 0.
    pub fn batch_utilization(&self) -> Option<f64> {
        (self.max_batch_size > 0).then(|| self.avg_batch_size / f64::from(self.max_batch_size))
    }

    /// GPU memory used / total, `None` without memory telemetry.
    pub fn memory_usage(&self) -> Option<f64> {
        (self.gpu_memory_total_gb != 0.0).then(|| self.gpu_memory_used_gb / self.gpu_memory_total_gb)
    }

    pub fn ttft_p95_ms(&self) -> f64 {
        self.ttft_p95 * 1000.0
    }

    pub fn tbt_p95_ms(&self) -> f64 {
        self.tbt_p95 * 1000.0
    }

    /// Rounded, display-friendly view of the headline fields.
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            timestamp: self.timestamp.to_rfc3339(),
            requests_running: self.requests_running,
            requests_waiting: self.requests_waiting,
            tokens_per_second: round_to(self.tokens_per_second, 1),
            ttft_p50_ms: round_to(self.ttft_p50 * 1000.0, 1),
            ttft_p95_ms: round_to(self.ttft_p95 * 1000.0, 1),
            tbt_p50_ms: round_to(self.tbt_p50 * 1000.0, 1),
            gpu_cache_pct: round_to(self.cache_usage * 100.0, 1),
            gpu_util_pct: round_to(self.gpu_utilization * 100.0, 1),
            avg_batch_size: round_to(self.avg_batch_size, 1),
            cost_per_1k_tokens: round_to(self.cost_per_1k_tokens, 4),
            sla_compliance_pct: round_to(self.sla_compliance * 100.0, 1),
        }
    }
}

/// Headline fields of a [`Snapshot`], rounded for display or logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub timestamp: String,
    pub requests_running: u32,
    pub requests_waiting: u32,
    pub tokens_per_second: f64,
    pub ttft_p50_ms: f64,
    pub ttft_p95_ms: f64,
    pub tbt_p50_ms: f64,
    pub gpu_cache_pct: f64,
    pub gpu_util_pct: f64,
    pub avg_batch_size: f64,
    pub cost_per_1k_tokens: f64,
    pub sla_compliance_pct: f64,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
