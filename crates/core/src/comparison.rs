//! Before/after comparison for measuring the impact of config changes.
//!
//! Collect a baseline window, make a change, collect an after window, then
//! [`compare`] them. Every tracked metric gets a delta so operators can see
//! what improved, what regressed, and by how much.

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

/// Changes smaller than this (in percent) are treated as noise.
pub const NOISE_THRESHOLD_PCT: f64 = 1.0;

/// Summary used when either window is empty.
pub const INSUFFICIENT_DATA_SUMMARY: &str = "Need snapshots in both windows to compare.";
/// Summary used when nothing moved past the noise threshold.
pub const NO_CHANGE_SUMMARY: &str = "No significant changes detected.";

// ---------------------------------------------------------------------------
// Tracked metrics
// ---------------------------------------------------------------------------

/// A snapshot field compared across windows.
struct TrackedMetric {
    name: &'static str,
    lower_is_better: bool,
    value: fn(&Snapshot) -> f64,
}

const TRACKED_METRICS: [TrackedMetric; 13] = [
    TrackedMetric {
        name: "Tokens/sec",
        lower_is_better: false,
        value: |s| s.tokens_per_second,
    },
    TrackedMetric {
        name: "Queue depth",
        lower_is_better: true,
        value: |s| f64::from(s.requests_waiting),
    },
    TrackedMetric {
        name: "TTFT p50",
        lower_is_better: true,
        value: |s| s.ttft_p50,
    },
    TrackedMetric {
        name: "TTFT p95",
        lower_is_better: true,
        value: |s| s.ttft_p95,
    },
    TrackedMetric {
        name: "TTFT p99",
        lower_is_better: true,
        value: |s| s.ttft_p99,
    },
    TrackedMetric {
        name: "TBT p50",
        lower_is_better: true,
        value: |s| s.tbt_p50,
    },
    TrackedMetric {
        name: "TBT p95",
        lower_is_better: true,
        value: |s| s.tbt_p95,
    },
    TrackedMetric {
        name: "KV cache usage",
        lower_is_better: true,
        value: |s| s.cache_usage,
    },
    TrackedMetric {
        name: "GPU utilization",
        lower_is_better: false,
        value: |s| s.gpu_utilization,
    },
    TrackedMetric {
        name: "Avg batch size",
        lower_is_better: false,
        value: |s| s.avg_batch_size,
    },
    TrackedMetric {
        name: "Cost per 1K tokens",
        lower_is_better: true,
        value: |s| s.cost_per_1k_tokens,
    },
    TrackedMetric {
        name: "Cumulative cost",
        lower_is_better: true,
        value: |s| s.cumulative_cost_usd,
    },
    TrackedMetric {
        name: "SLA compliance",
        lower_is_better: false,
        value: |s| s.sla_compliance,
    },
];

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Change in one metric between the two windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub name: String,
    /// Average over the before window.
    pub before: f64,
    /// Average over the after window.
    pub after: f64,
    pub delta: f64,
    /// Percentage change relative to `before`; 0 when `before` is 0.
    pub delta_pct: f64,
    /// `None` when the change is within noise.
    pub improved: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub before_count: usize,
    pub after_count: usize,
    pub deltas: Vec<MetricDelta>,
    /// One-line verdict.
    pub summary: String,
}

impl ComparisonReport {
    pub fn improvements(&self) -> Vec<&MetricDelta> {
        self.deltas.iter().filter(|d| d.improved == Some(true)).collect()
    }

    pub fn regressions(&self) -> Vec<&MetricDelta> {
        self.deltas.iter().filter(|d| d.improved == Some(false)).collect()
    }
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// Compare two windows of snapshots metric by metric.
///
/// An empty window on either side yields a report with zero counts, no
/// deltas, and [`INSUFFICIENT_DATA_SUMMARY`].
pub fn compare(before: &[Snapshot], after: &[Snapshot]) -> ComparisonReport {
    if before.is_empty() || after.is_empty() {
        return ComparisonReport {
            before_count: 0,
            after_count: 0,
            deltas: Vec::new(),
            summary: INSUFFICIENT_DATA_SUMMARY.to_string(),
        };
    }

    let deltas: Vec<MetricDelta> = TRACKED_METRICS
        .iter()
        .map(|metric| metric_delta(metric, before, after))
        .collect();

    let improvements = deltas.iter().filter(|d| d.improved == Some(true)).count();
    let regressions = deltas.iter().filter(|d| d.improved == Some(false)).count();

    ComparisonReport {
        before_count: before.len(),
        after_count: after.len(),
        deltas,
        summary: summarize(improvements, regressions),
    }
}

fn metric_delta(metric: &TrackedMetric, before: &[Snapshot], after: &[Snapshot]) -> MetricDelta {
    let before_avg = average(before, metric.value);
    let after_avg = average(after, metric.value);
    let delta = after_avg - before_avg;
    let delta_pct = if before_avg != 0.0 {
        delta / before_avg.abs() * 100.0
    } else {
        0.0
    };

    let improved = if delta_pct.abs() < NOISE_THRESHOLD_PCT {
        None
    } else if metric.lower_is_better {
        Some(delta < 0.0)
    } else {
        Some(delta > 0.0)
    };

    MetricDelta {
        name: metric.name.to_string(),
        before: before_avg,
        after: after_avg,
        delta,
        delta_pct,
        improved,
    }
}

fn average(window: &[Snapshot], value: fn(&Snapshot) -> f64) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    window.iter().map(value).sum::<f64>() / window.len() as f64
}

fn summarize(improvements: usize, regressions: usize) -> String {
    match (improvements, regressions) {
        (0, 0) => NO_CHANGE_SUMMARY.to_string(),
        (n, 0) => format!("{n} metrics improved, no regressions."),
        (0, m) => format!("{m} metrics regressed, no improvements."),
        (n, m) => format!("{n} improved, {m} regressed -- mixed results."),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn baseline() -> Snapshot {
        Snapshot {
            requests_running: 8,
            requests_waiting: 2,
            tokens_per_second: 100.0,
            ttft_p50: 0.05,
            ttft_p95: 0.10,
            ttft_p99: 0.15,
            tbt_p50: 0.015,
            tbt_p95: 0.025,
            tbt_p99: 0.035,
            cache_usage: 0.5,
            gpu_utilization: 0.6,
            avg_batch_size: 8.0,
            max_batch_size: 16,
            cost_per_1k_tokens: 0.003,
            cumulative_cost_usd: 1.0,
            sla_compliance: 0.9,
            ..Snapshot::default()
        }
    }

    fn delta<'a>(report: &'a ComparisonReport, name: &str) -> &'a MetricDelta {
        report.deltas.iter().find(|d| d.name == name).unwrap()
    }

    #[test]
    fn identical_windows_have_no_changes() {
        let window = vec![baseline(); 3];
        let report = compare(&window, &window);
        assert_eq!(report.deltas.len(), 13);
        assert_eq!(report.summary, "No significant changes detected.");
        assert!(report.improvements().is_empty());
        assert!(report.regressions().is_empty());
    }

    #[test]
    fn empty_before_window_is_insufficient() {
        let report = compare(&[], &[baseline()]);
        assert_eq!(report.before_count, 0);
        assert_eq!(report.after_count, 0);
        assert!(report.deltas.is_empty());
        assert_eq!(report.summary, INSUFFICIENT_DATA_SUMMARY);
    }

    #[test]
    fn empty_after_window_is_insufficient() {
        let report = compare(&[baseline()], &[]);
        assert!(report.deltas.is_empty());
        assert_eq!(report.summary, INSUFFICIENT_DATA_SUMMARY);
    }

    #[test]
    fn throughput_gain_is_improvement() {
        let after = Snapshot {
            tokens_per_second: 120.0,
            ..baseline()
        };
        let report = compare(&[baseline()], &[after]);
        let tps = delta(&report, "Tokens/sec");
        assert_eq!(tps.improved, Some(true));
        assert!((tps.delta_pct - 20.0).abs() < 1e-9);
        assert_eq!(report.summary, "1 metrics improved, no regressions.");
    }

    #[test]
    fn latency_increase_is_regression() {
        let after = Snapshot {
            ttft_p95: 0.2,
            ..baseline()
        };
        let report = compare(&[baseline()], &[after]);
        assert_matches!(delta(&report, "TTFT p95").improved, Some(false));
        assert_eq!(report.summary, "1 metrics regressed, no improvements.");
    }

    #[test]
    fn mixed_results() {
        let after = Snapshot {
            tokens_per_second: 150.0,
            cache_usage: 0.8,
            ..baseline()
        };
        let report = compare(&[baseline()], &[after]);
        assert_eq!(report.improvements().len(), 1);
        assert_eq!(report.regressions().len(), 1);
        assert_eq!(report.summary, "1 improved, 1 regressed -- mixed results.");
    }

    #[test]
    fn small_change_is_noise() {
        let after = Snapshot {
            tokens_per_second: 100.5,
            ..baseline()
        };
        let report = compare(&[baseline()], &[after]);
        assert_matches!(delta(&report, "Tokens/sec").improved, None);
    }

    #[test]
    fn zero_baseline_has_zero_pct() {
        let before = Snapshot {
            requests_waiting: 0,
            ..baseline()
        };
        let after = Snapshot {
            requests_waiting: 4,
            ..baseline()
        };
        let report = compare(&[before], &[after]);
        let queue = delta(&report, "Queue depth");
        assert_eq!(queue.delta, 4.0);
        assert_eq!(queue.delta_pct, 0.0);
        assert_matches!(queue.improved, None);
    }

    #[test]
    fn averages_over_whole_window() {
        let fast = Snapshot {
            tokens_per_second: 80.0,
            ..baseline()
        };
        let slow = Snapshot {
            tokens_per_second: 120.0,
            ..baseline()
        };
        let report = compare(&[fast, slow], &[baseline()]);
        assert_eq!(report.before_count, 2);
        assert_eq!(report.after_count, 1);
        assert_eq!(delta(&report, "Tokens/sec").before, 100.0);
    }

    #[test]
    fn metric_order_is_fixed() {
        let report = compare(&[baseline()], &[baseline()]);
        let names: Vec<&str> = report.deltas.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"Tokens/sec"));
        assert_eq!(names.last(), Some(&"SLA compliance"));
    }
}
