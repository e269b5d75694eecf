//! Well-known vLLM metric family names.
//!
//! These are the base names (suffix already stripped) the snapshot
//! assembler looks up in a parsed exposition.

/// Requests currently scheduled on the GPU.
pub const VLLM_REQUESTS_RUNNING: &str = "vllm:num_requests_running";

/// Requests waiting in the scheduler queue.
pub const VLLM_REQUESTS_WAITING: &str = "vllm:num_requests_waiting";

/// Requests finished successfully (counter, `_total` suffix on the wire).
pub const VLLM_REQUEST_SUCCESS: &str = "vllm:request_success";

/// Prefill tokens processed (counter, `_total` suffix on the wire).
pub const VLLM_PROMPT_TOKENS: &str = "vllm:prompt_tokens";

/// Decode tokens produced (counter, `_total` suffix on the wire).
pub const VLLM_GENERATION_TOKENS: &str = "vllm:generation_tokens";

/// Average prefill throughput gauge in tokens per second.
pub const VLLM_PROMPT_THROUGHPUT: &str = "vllm:avg_prompt_throughput_toks_per_s";

/// Average decode throughput gauge in tokens per second.
pub const VLLM_GENERATION_THROUGHPUT: &str = "vllm:avg_generation_throughput_toks_per_s";

/// KV cache fill fraction. 1 means 100 percent usage.
pub const VLLM_CACHE_USAGE: &str = "vllm:gpu_cache_usage_perc";

/// Time-to-first-token histogram, seconds.
pub const VLLM_TTFT_SECONDS: &str = "vllm:time_to_first_token_seconds";

/// Time-per-output-token histogram, seconds.
pub const VLLM_TBT_SECONDS: &str = "vllm:time_per_output_token_seconds";
