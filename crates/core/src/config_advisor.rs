//! vLLM configuration suggestions derived from a single snapshot.
//!
//! These are heuristics based on known vLLM behavior, not guarantees;
//! [`crate::comparison`] is what measures whether a change helped.

use serde::{Deserialize, Serialize};

use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Batch utilization below which the concurrency cap is oversized.
pub const BATCH_UNDERUSED: f64 = 0.40;
/// Batch utilization above which the cap is limiting throughput.
pub const BATCH_SATURATED: f64 = 0.85;
/// Waiting requests that count as a backlog for a saturated batch.
pub const BATCH_BACKLOG: u32 = 3;

/// Cache usage above which shorter contexts are suggested.
pub const CACHE_REDUCE_CONTEXT: f64 = 0.85;
/// Cache usage above which chunked prefill is considered.
pub const CACHE_CHUNKED_PREFILL: f64 = 0.70;
/// TTFT p95 (seconds) above which chunked prefill is suggested.
pub const TTFT_CHUNKED_PREFILL_SECS: f64 = 0.15;

/// VRAM usage below which the memory cap can be raised.
pub const MEMORY_HEADROOM: f64 = 0.60;
/// Cache usage that makes the memory headroom worth reclaiming.
pub const MEMORY_HEADROOM_CACHE: f64 = 0.80;

/// VRAM usage above which quantization is suggested.
pub const MEMORY_TIGHT: f64 = 0.90;
/// Cache usage that makes quantization worth its quality cost.
pub const QUANTIZATION_CACHE: f64 = 0.85;

/// Cache usage above which prefix caching is suggested.
pub const PREFIX_CACHE_USAGE: f64 = 0.60;
/// Running requests above which shared prefixes are likely.
pub const PREFIX_CACHE_RUNNING: u32 = 4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How sure the advisor is that a suggestion will help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A single configuration change worth trying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSuggestion {
    /// vLLM CLI flag or env var.
    pub flag: String,
    /// What the current state looks like.
    pub current_hint: String,
    pub suggested_action: String,
    pub expected_impact: String,
    pub confidence: Confidence,
    /// 1 = try first, higher = less urgent.
    pub priority: u32,
}

// ---------------------------------------------------------------------------
// Advisor
// ---------------------------------------------------------------------------

/// Suggest config changes for `snapshot`, most urgent first.
pub fn advise(snapshot: &Snapshot) -> Vec<ConfigSuggestion> {
    let mut suggestions = Vec::new();

    advise_batch_size(snapshot, &mut suggestions);
    advise_cache(snapshot, &mut suggestions);
    advise_gpu_memory(snapshot, &mut suggestions);
    advise_quantization(snapshot, &mut suggestions);
    advise_prefix_caching(snapshot, &mut suggestions);

    suggestions.sort_by_key(|s| s.priority);
    suggestions
}

fn advise_batch_size(snap: &Snapshot, out: &mut Vec<ConfigSuggestion>) {
    let Some(util) = snap.batch_utilization() else {
        return;
    };

    if util < BATCH_UNDERUSED && snap.requests_waiting == 0 {
        out.push(ConfigSuggestion {
            flag: "--max-num-seqs".to_string(),
            current_hint: format!("Batch {:.0}% utilized, no queue", util * 100.0),
            suggested_action: "Decrease to match actual demand (saves memory for KV cache)"
                .to_string(),
            expected_impact: "Frees VRAM for longer sequences or larger cache".to_string(),
            confidence: Confidence::High,
            priority: 3,
        });
    } else if util > BATCH_SATURATED && snap.requests_waiting > BATCH_BACKLOG {
        out.push(ConfigSuggestion {
            flag: "--max-num-seqs".to_string(),
            current_hint: format!(
                "Batch {:.0}% full, {} queued",
                util * 100.0,
                snap.requests_waiting
            ),
            suggested_action: "Increase if VRAM allows (watch KV cache usage)".to_string(),
            expected_impact: "Reduces queue wait time, improves TTFT".to_string(),
            confidence: Confidence::Medium,
            priority: 1,
        });
    }
}

fn advise_cache(snap: &Snapshot, out: &mut Vec<ConfigSuggestion>) {
    let cache = snap.cache_usage;

    if cache > CACHE_REDUCE_CONTEXT {
        out.push(ConfigSuggestion {
            flag: "--max-model-len".to_string(),
            current_hint: format!("KV cache at {:.0}%", cache * 100.0),
            suggested_action:
                "Reduce max sequence length if your workload allows shorter contexts".to_string(),
            expected_impact: "Lowers peak cache usage, prevents eviction stalls".to_string(),
            confidence: Confidence::Medium,
            priority: 1,
        });
    }

    if cache > CACHE_CHUNKED_PREFILL && snap.ttft_p95 > TTFT_CHUNKED_PREFILL_SECS {
        out.push(ConfigSuggestion {
            flag: "--enable-chunked-prefill".to_string(),
            current_hint: format!(
                "Cache at {:.0}%, TTFT p95 at {:.0}ms",
                cache * 100.0,
                snap.ttft_p95_ms()
            ),
            suggested_action:
                "Enable chunked prefill to overlap prompt processing with generation".to_string(),
            expected_impact: "Smooths out TTFT spikes under high cache pressure".to_string(),
            confidence: Confidence::Medium,
            priority: 2,
        });
    }
}

fn advise_gpu_memory(snap: &Snapshot, out: &mut Vec<ConfigSuggestion>) {
    let Some(mem_usage) = snap.memory_usage() else {
        return;
    };

    if mem_usage < MEMORY_HEADROOM && snap.cache_usage > MEMORY_HEADROOM_CACHE {
        out.push(ConfigSuggestion {
            flag: "--gpu-memory-utilization".to_string(),
            current_hint: format!(
                "VRAM {:.0}% used but cache at {:.0}%",
                mem_usage * 100.0,
                snap.cache_usage * 100.0
            ),
            suggested_action: "Increase from default 0.9 to 0.95 to give more space to KV cache"
                .to_string(),
            expected_impact: "More cache headroom, fewer evictions".to_string(),
            confidence: Confidence::High,
            priority: 1,
        });
    }
}

fn advise_quantization(snap: &Snapshot, out: &mut Vec<ConfigSuggestion>) {
    let Some(mem_usage) = snap.memory_usage() else {
        return;
    };

    if mem_usage > MEMORY_TIGHT && snap.cache_usage > QUANTIZATION_CACHE {
        out.push(ConfigSuggestion {
            flag: "--quantization awq / --quantization gptq".to_string(),
            current_hint: format!(
                "VRAM at {:.0}%, cache at {:.0}%",
                mem_usage * 100.0,
                snap.cache_usage * 100.0
            ),
            suggested_action: "Use a quantized model variant to free VRAM for KV cache"
                .to_string(),
            expected_impact: "~50% model memory reduction, minor quality tradeoff".to_string(),
            confidence: Confidence::Low,
            priority: 4,
        });
    }
}

fn advise_prefix_caching(snap: &Snapshot, out: &mut Vec<ConfigSuggestion>) {
    if snap.cache_usage > PREFIX_CACHE_USAGE && snap.requests_running > PREFIX_CACHE_RUNNING {
        out.push(ConfigSuggestion {
            flag: "--enable-prefix-caching".to_string(),
            current_hint: format!(
                "Cache at {:.0}% with {} active",
                snap.cache_usage * 100.0,
                snap.requests_running
            ),
            suggested_action: "Enable automatic prefix caching for shared prompt prefixes"
                .to_string(),
            expected_impact: "Reduces cache duplication if requests share common system prompts"
                .to_string(),
            confidence: Confidence::Medium,
            priority: 2,
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> Snapshot {
        Snapshot {
            requests_running: 8,
            requests_waiting: 0,
            tokens_per_second: 80.0,
            ttft_p95: 0.12,
            tbt_p95: 0.025,
            cache_usage: 0.50,
            gpu_memory_used_gb: 16.0,
            gpu_memory_total_gb: 24.0,
            gpu_utilization: 0.65,
            avg_batch_size: 8.0,
            max_batch_size: 16,
            cost_per_1k_tokens: 0.003,
            ..Snapshot::default()
        }
    }

    fn flags(suggestions: &[ConfigSuggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.flag.as_str()).collect()
    }

    #[test]
    fn healthy_snapshot_has_no_suggestions() {
        assert!(advise(&healthy()).is_empty());
    }

    #[test]
    fn underused_batch_suggests_decrease() {
        let snap = Snapshot {
            avg_batch_size: 3.0,
            requests_running: 3,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].flag, "--max-num-seqs");
        assert_eq!(suggestions[0].priority, 3);
        assert_eq!(suggestions[0].confidence, Confidence::High);
        assert!(suggestions[0].suggested_action.starts_with("Decrease"));
    }

    #[test]
    fn saturated_batch_suggests_increase() {
        let snap = Snapshot {
            avg_batch_size: 15.0,
            max_batch_size: 16,
            requests_waiting: 5,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].priority, 1);
        assert!(suggestions[0].suggested_action.starts_with("Increase"));
    }

    #[test]
    fn saturated_batch_needs_real_backlog() {
        let snap = Snapshot {
            avg_batch_size: 15.0,
            requests_waiting: 2,
            ..healthy()
        };
        assert!(advise(&snap).is_empty());
    }

    #[test]
    fn full_cache_suggests_shorter_context() {
        let snap = Snapshot {
            cache_usage: 0.95,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert!(suggestions.iter().any(|s| s.flag == "--max-model-len"));
        assert!(flags(&suggestions).contains(&"--enable-prefix-caching"));
    }

    #[test]
    fn cache_pressure_with_slow_ttft_suggests_chunked_prefill() {
        let snap = Snapshot {
            cache_usage: 0.75,
            ttft_p95: 0.2,
            requests_running: 3,
            avg_batch_size: 8.0,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(flags(&suggestions), vec!["--enable-chunked-prefill"]);
        assert_eq!(suggestions[0].priority, 2);
    }

    #[test]
    fn memory_headroom_suggests_raising_cap() {
        let snap = Snapshot {
            cache_usage: 0.82,
            gpu_memory_used_gb: 12.0,
            requests_running: 2,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(flags(&suggestions), vec!["--gpu-memory-utilization"]);
        assert_eq!(suggestions[0].confidence, Confidence::High);
    }

    #[test]
    fn memory_rules_need_telemetry() {
        let snap = Snapshot {
            cache_usage: 0.82,
            gpu_memory_used_gb: 0.0,
            gpu_memory_total_gb: 0.0,
            requests_running: 2,
            ..healthy()
        };
        assert!(advise(&snap).is_empty());
    }

    #[test]
    fn tight_memory_suggests_quantization() {
        let snap = Snapshot {
            cache_usage: 0.9,
            gpu_memory_used_gb: 23.0,
            requests_running: 2,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(
            flags(&suggestions),
            vec!["--max-model-len", "--quantization awq / --quantization gptq"]
        );
        assert_eq!(suggestions[1].priority, 4);
        assert_eq!(suggestions[1].confidence, Confidence::Low);
    }

    #[test]
    fn busy_cache_suggests_prefix_caching() {
        let snap = Snapshot {
            cache_usage: 0.65,
            requests_running: 6,
            avg_batch_size: 8.0,
            ..healthy()
        };
        let suggestions = advise(&snap);
        assert_eq!(flags(&suggestions), vec!["--enable-prefix-caching"]);
    }

    #[test]
    fn sorted_by_priority() {
        let snap = Snapshot {
            cache_usage: 0.95,
            ttft_p95: 0.3,
            gpu_memory_used_gb: 23.0,
            avg_batch_size: 2.0,
            requests_running: 6,
            ..healthy()
        };
        let suggestions = advise(&snap);
        let priorities: Vec<u32> = suggestions.iter().map(|s| s.priority).collect();
        assert_eq!(priorities, vec![1, 2, 2, 3, 4]);
        assert!(priorities.windows(2).all(|w| w[0] <= w[1]));
    }
}
