//! Simulated vLLM server for running without a GPU.
//!
//! Renders the same text exposition a real server serves at `/metrics`,
//! loosely modelled on Llama 3 8B under moderate traffic on a 24 GB GPU.
//! The output goes through the real parser and assembler, so the mock
//! exercises the full pipeline. Output is deterministic for a given seed.

use std::fmt::Write as _;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use throtl_core::metric_names::{
    VLLM_CACHE_USAGE, VLLM_GENERATION_THROUGHPUT, VLLM_GENERATION_TOKENS, VLLM_PROMPT_THROUGHPUT,
    VLLM_PROMPT_TOKENS, VLLM_REQUESTS_RUNNING, VLLM_REQUESTS_WAITING, VLLM_REQUEST_SUCCESS,
    VLLM_TBT_SECONDS, VLLM_TTFT_SECONDS,
};
use throtl_core::GpuReading;

/// TTFT bucket boundaries matching vLLM defaults.
const TTFT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.02, 0.04, 0.06, 0.08, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];
/// TBT bucket boundaries matching vLLM defaults.
const TBT_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.02, 0.04, 0.06, 0.08, 0.1, 0.25, 0.5, 1.0, 2.5,
];

const GPU_MEMORY_TOTAL_GB: f64 = 24.0;
/// ~8B params in fp16.
const MODEL_MEMORY_GB: f64 = 8.5;
/// Running requests past which the queue starts to build.
const QUEUE_ONSET: i64 = 12;
const SIMULATED_MAX_BATCH: u32 = 16;

/// One rendered scrape.
#[derive(Debug, Clone)]
pub struct MockScrape {
    pub exposition: String,
    pub gpu: GpuReading,
}

/// Stateful simulation; each [`MockVllmServer::scrape`] advances one tick.
pub struct MockVllmServer {
    rng: StdRng,
    tick: u64,
    prompt_tokens: u64,
    generation_tokens: u64,
    completed: u64,
}

impl MockVllmServer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tick: 0,
            prompt_tokens: 0,
            generation_tokens: 0,
            completed: 0,
        }
    }

    /// Advance the simulation and render its metrics.
    pub fn scrape(&mut self) -> MockScrape {
        self.tick += 1;
        let t = self.tick as f64;

        // Sinusoidal base load with occasional random spikes.
        let base_load = 8.0 + 6.0 * (t * 0.05).sin();
        let spike = if self.rng.random::<f64>() > 0.9 {
            self.rng.random::<f64>() * 8.0
        } else {
            0.0
        };
        let running = ((base_load + spike) as i64).max(1);
        let queue_pressure = (running - QUEUE_ONSET).max(0) as f64;
        let waiting = (queue_pressure * self.rng.random_range(0.5..1.5)) as i64;

        // Throughput scales with batch size up to the cap.
        let batch = running.min(i64::from(SIMULATED_MAX_BATCH)) as f64;
        let tokens_per_second = (45.0 + batch * 8.0 + self.jitter(5.0)).max(10.0);

        let generated = (tokens_per_second * 2.0) as u64;
        self.generation_tokens += generated;
        self.prompt_tokens += (generated as f64 * 0.6) as u64;
        self.completed += (running as u64 / 3).max(1);

        // KV cache grows with active sequences.
        let cache = (0.3 + (running as f64 / 20.0) * 0.5 + self.jitter(0.03)).clamp(0.1, 0.98);

        // VRAM = model weights + KV cache.
        let memory_used_gb = MODEL_MEMORY_GB + (GPU_MEMORY_TOTAL_GB - MODEL_MEMORY_GB) * cache;
        let utilization = (0.3 + tokens_per_second / 200.0 + self.jitter(0.03)).clamp(0.0, 0.99);

        // TTFT degrades with queue depth and cache pressure; TBT tracks load.
        let ttft_center = 0.08 + waiting as f64 * 0.02 + cache * 0.05;
        let tbt_center = 0.012 + (running as f64 / 50.0) * 0.005;
        let request_count = self.tick * 3;

        let mut text = String::new();
        gauge(&mut text, VLLM_REQUESTS_RUNNING, "Number of requests currently running", running as f64);
        gauge(&mut text, VLLM_REQUESTS_WAITING, "Number of requests waiting", waiting as f64);
        gauge(&mut text, VLLM_CACHE_USAGE, "GPU KV-cache usage. 1 means 100 percent usage.", cache);
        counter(&mut text, VLLM_REQUEST_SUCCESS, "Count of successfully processed requests", self.completed);
        counter(&mut text, VLLM_PROMPT_TOKENS, "Number of prefill tokens processed", self.prompt_tokens);
        counter(&mut text, VLLM_GENERATION_TOKENS, "Number of generation tokens processed", self.generation_tokens);
        gauge(&mut text, VLLM_PROMPT_THROUGHPUT, "Average prefill throughput", tokens_per_second * 0.4);
        gauge(&mut text, VLLM_GENERATION_THROUGHPUT, "Average generation throughput", tokens_per_second * 0.6);
        histogram(&mut text, VLLM_TTFT_SECONDS, TTFT_BUCKETS, ttft_center, ttft_center * 0.5, request_count);
        histogram(&mut text, VLLM_TBT_SECONDS, TBT_BUCKETS, tbt_center, tbt_center * 0.3, request_count * 50);

        MockScrape {
            exposition: text,
            gpu: GpuReading {
                utilization,
                memory_used_gb,
                memory_total_gb: GPU_MEMORY_TOTAL_GB,
            },
        }
    }

    /// Symmetric noise in `[-scale, scale)`.
    fn jitter(&mut self, scale: f64) -> f64 {
        self.rng.random_range(-scale..scale)
    }
}

// The render helpers below ignore `fmt::Result`: writing to a `String`
// cannot fail.

fn gauge(out: &mut String, name: &str, help: &str, value: f64) {
    let _ = write!(out, "# HELP {name} {help}\n# TYPE {name} gauge\n{name} {value}\n\n");
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = write!(
        out,
        "# HELP {name}_total {help}\n# TYPE {name}_total counter\n{name}_total {value}\n\n"
    );
}

/// Render a cumulative histogram whose CDF is a sigmoid around `center`.
///
/// Not statistically precise, but produces believable bucket counts.
fn histogram(out: &mut String, name: &str, bounds: &[f64], center: f64, spread: f64, count: u64) {
    let _ = writeln!(out, "# HELP {name} Histogram of {name}\n# TYPE {name} histogram");
    for &le in bounds {
        let z = (le - center) / spread.max(0.001);
        let fraction = 1.0 / (1.0 + (-3.0 * z).exp());
        let cumulative = (fraction * count as f64) as u64;
        let _ = writeln!(out, "{name}_bucket{{le=\"{le}\"}} {cumulative}");
    }
    let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}");
    let _ = writeln!(out, "{name}_count {count}");
    let _ = writeln!(out, "{name}_sum {:.4}\n", center * count as f64);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
