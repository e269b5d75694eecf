//! Percentile estimation from cumulative histogram buckets.
//!
//! Uses the same linear interpolation inside a bucket that
//! `histogram_quantile()` does. Accuracy depends on the bucket boundaries,
//! which is good enough for watching latency distributions live.

use crate::exposition::{MetricFamilies, MetricFamily};

const INF_BOUND: &str = "+Inf";

/// Finite buckets plus the total observation count of one histogram.
#[derive(Debug, Clone, PartialEq)]
struct Buckets {
    /// `(upper bound, cumulative count)`, sorted by bound.
    finite: Vec<(f64, f64)>,
    total_count: f64,
}

/// Collect buckets from a histogram family.
///
/// Both the `+Inf` bucket and the `_count` sample set the total; whichever
/// appears later in the family wins. Returns `None` when there are no finite
/// buckets or the total is missing or zero.
fn collect_buckets(family: &MetricFamily) -> Option<Buckets> {
    let mut finite = Vec::new();
    let mut total_count = None;

    for sample in &family.samples {
        if sample.name.ends_with("_bucket") {
            match sample.labels.get("le").map(String::as_str) {
                Some(INF_BOUND) => total_count = Some(sample.value),
                Some(le) => {
                    if let Ok(bound) = le.parse::<f64>() {
                        finite.push((bound, sample.value));
                    }
                }
                None => {}
            }
        } else if sample.name.ends_with("_count") {
            total_count = Some(sample.value);
        }
    }

    let total_count = total_count.filter(|&count| count != 0.0)?;
    if finite.is_empty() {
        return None;
    }

    finite.sort_by(|a, b| a.0.total_cmp(&b.0));
    Some(Buckets {
        finite,
        total_count,
    })
}

/// Estimate the `percentile` (in `(0, 1]`) of histogram family `name`.
///
/// Returns the largest finite boundary when the target rank lies past every
/// finite bucket, and `None` when the family or its buckets are unavailable.
pub fn histogram_percentile(families: &MetricFamilies, name: &str, percentile: f64) -> Option<f64> {
    let buckets = collect_buckets(families.get(name)?)?;
    let target = percentile * buckets.total_count;

    let mut prev_bound = 0.0;
    let mut prev_count = 0.0;

    for &(bound, count) in &buckets.finite {
        if count >= target {
            let fraction = (target - prev_count) / f64::max(1.0, count - prev_count);
            return Some(prev_bound + fraction * (bound - prev_bound));
        }
        prev_bound = bound;
        prev_count = count;
    }

    buckets.finite.last().map(|&(bound, _)| bound)
}

/// Estimate the fraction of observations at or below `threshold`.
///
/// The inverse of [`histogram_percentile`], interpolating linearly inside
/// the bucket that contains `threshold`. Values past the last finite bucket
/// use that bucket's cumulative count. The result is clamped to `[0, 1]`.
pub fn histogram_fraction_at_or_below(
    families: &MetricFamilies,
    name: &str,
    threshold: f64,
) -> Option<f64> {
    let buckets = collect_buckets(families.get(name)?)?;

    let mut prev_bound = 0.0;
    let mut prev_count = 0.0;
    let mut observed = None;

    for &(bound, count) in &buckets.finite {
        if threshold <= bound {
            let width = bound - prev_bound;
            let fraction = if width > 0.0 {
                ((threshold - prev_bound) / width).max(0.0)
            } else {
                1.0
            };
            observed = Some(prev_count + fraction * (count - prev_count));
            break;
        }
        prev_bound = bound;
        prev_count = count;
    }

    let observed = observed.unwrap_or(prev_count);
    Some((observed / buckets.total_count).clamp(0.0, 1.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
