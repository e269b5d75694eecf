//! Agent configuration loaded from environment variables.
//!
//! | Env Var                       | Default | Description                                |
//! |-------------------------------|---------|--------------------------------------------|
//! | `THROTL_VLLM_URL`             | --      | vLLM base URL (`/metrics` appended)        |
//! | `THROTL_MOCK`                 | `false` | Use simulated metrics instead of scraping  |
//! | `THROTL_MOCK_SEED`            | `42`    | Seed for the simulated server              |
//! | `THROTL_INTERVAL_SECS`        | `2`     | Seconds between collections                |
//! | `THROTL_GPU_COST_PER_HOUR`    | `1.0`   | GPU price in USD per hour                  |
//! | `THROTL_SLA_TARGET_MS`        | `500`   | TTFT SLA target in milliseconds            |
//! | `THROTL_MAX_BATCH_SIZE`       | `16`    | Server `--max-num-seqs` setting            |
//! | `THROTL_GPU_INDEX`            | `0`     | NVML device index                          |
//! | `THROTL_HISTORY_LEN`          | `60`    | Trailing snapshots kept for trend rules    |
//! | `THROTL_MAX_FAILURES`         | `5`     | Consecutive scrape failures before abort   |
//! | `THROTL_REQUEST_TIMEOUT_SECS` | `5`     | HTTP timeout per scrape                    |
//! | `THROTL_MAX_TICKS`            | `0`     | Stop after N collections (0 = run forever) |
//! | `THROTL_COMPARE_WINDOW`       | `10`    | Window size for the exit comparison        |
//!
//! Exactly one of `THROTL_VLLM_URL` or `THROTL_MOCK=true` must be set.

use std::str::FromStr;
use std::time::Duration;

use throtl_core::snapshot::{DEFAULT_COST_PER_HOUR, DEFAULT_MAX_BATCH_SIZE, DEFAULT_SLA_TARGET_MS};
use throtl_core::threshold_validation::validate_positive_count;
use throtl_core::{AssemblerSettings, CoreError};

const DEFAULT_MOCK_SEED: u64 = 42;
const DEFAULT_INTERVAL_SECS: u64 = 2;
const DEFAULT_GPU_INDEX: u32 = 0;
const DEFAULT_HISTORY_LEN: u32 = 60;
const DEFAULT_MAX_FAILURES: u32 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MAX_TICKS: u64 = 0;
const DEFAULT_COMPARE_WINDOW: u32 = 10;

/// Errors raised while reading the agent configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No data source: set THROTL_VLLM_URL or THROTL_MOCK=true")]
    MissingSource,

    #[error("Conflicting data sources: THROTL_VLLM_URL and THROTL_MOCK are both set")]
    ConflictingSources,

    #[error("{var} has an invalid value: '{value}'")]
    Invalid { var: &'static str, value: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Where snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Scrape a live vLLM server.
    Vllm { url: String },
    /// Simulate one in process.
    Mock { seed: u64 },
}

/// Everything the agent needs to run.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub source: Source,
    pub interval: Duration,
    pub assembler: AssemblerSettings,
    pub gpu_index: u32,
    pub history_len: usize,
    pub max_failures: u32,
    pub request_timeout: Duration,
    /// `None` runs until interrupted.
    pub max_ticks: Option<u64>,
    pub compare_window: usize,
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("THROTL_VLLM_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let mock = match lookup("THROTL_MOCK") {
            Some(value) => parse_bool("THROTL_MOCK", &value)?,
            None => false,
        };

        let source = match (url, mock) {
            (Some(_), true) => return Err(ConfigError::ConflictingSources),
            (Some(url), false) => Source::Vllm { url },
            (None, true) => Source::Mock {
                seed: parse_or(&lookup, "THROTL_MOCK_SEED", DEFAULT_MOCK_SEED)?,
            },
            (None, false) => return Err(ConfigError::MissingSource),
        };

        let assembler = AssemblerSettings {
            cost_per_hour: parse_or(&lookup, "THROTL_GPU_COST_PER_HOUR", DEFAULT_COST_PER_HOUR)?,
            sla_target_ms: parse_or(&lookup, "THROTL_SLA_TARGET_MS", DEFAULT_SLA_TARGET_MS)?,
            max_batch_size: parse_or(&lookup, "THROTL_MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE)?,
        };
        assembler.validate()?;

        let interval_secs: u64 = parse_or(&lookup, "THROTL_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        let history_len: u32 = parse_or(&lookup, "THROTL_HISTORY_LEN", DEFAULT_HISTORY_LEN)?;
        let max_failures: u32 = parse_or(&lookup, "THROTL_MAX_FAILURES", DEFAULT_MAX_FAILURES)?;
        let timeout_secs: u64 =
            parse_or(&lookup, "THROTL_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let max_ticks: u64 = parse_or(&lookup, "THROTL_MAX_TICKS", DEFAULT_MAX_TICKS)?;
        let compare_window: u32 =
            parse_or(&lookup, "THROTL_COMPARE_WINDOW", DEFAULT_COMPARE_WINDOW)?;

        // A zero period would make the ticker panic.
        if interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "THROTL_INTERVAL_SECS",
                value: interval_secs.to_string(),
            });
        }
        validate_positive_count(history_len, "history_len")?;
        validate_positive_count(max_failures, "max_failures")?;
        validate_positive_count(compare_window, "compare_window")?;

        Ok(Self {
            source,
            interval: Duration::from_secs(interval_secs),
            assembler,
            gpu_index: parse_or(&lookup, "THROTL_GPU_INDEX", DEFAULT_GPU_INDEX)?,
            history_len: history_len as usize,
            max_failures,
            request_timeout: Duration::from_secs(timeout_secs),
            max_ticks: (max_ticks > 0).then_some(max_ticks),
            compare_window: compare_window as usize,
        })
    }
}

/// Parse `var` if set, otherwise return `default`.
fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AgentConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn mock_source_with_defaults() {
        let config = load(&[("THROTL_MOCK", "true")]).unwrap();
        assert_eq!(config.source, Source::Mock { seed: 42 });
        assert_eq!(config.interval, Duration::from_secs(2));
        assert_eq!(config.assembler, AssemblerSettings::default());
        assert_eq!(config.history_len, 60);
        assert_eq!(config.max_failures, 5);
        assert_eq!(config.max_ticks, None);
        assert_eq!(config.compare_window, 10);
    }

    #[test]
    fn vllm_source_with_overrides() {
        let config = load(&[
            ("THROTL_VLLM_URL", "http://localhost:8000"),
            ("THROTL_GPU_COST_PER_HOUR", "2.5"),
            ("THROTL_MAX_BATCH_SIZE", "64"),
            ("THROTL_MAX_TICKS", "30"),
        ])
        .unwrap();
        assert_eq!(
            config.source,
            Source::Vllm {
                url: "http://localhost:8000".to_string()
            }
        );
        assert_eq!(config.assembler.cost_per_hour, 2.5);
        assert_eq!(config.assembler.max_batch_size, 64);
        assert_eq!(config.max_ticks, Some(30));
    }

    #[test]
    fn mock_seed_override() {
        let config = load(&[("THROTL_MOCK", "yes"), ("THROTL_MOCK_SEED", "7")]).unwrap();
        assert_eq!(config.source, Source::Mock { seed: 7 });
    }

    #[test]
    fn missing_source_is_rejected() {
        assert_matches!(load(&[]), Err(ConfigError::MissingSource));
        assert_matches!(load(&[("THROTL_VLLM_URL", "  ")]), Err(ConfigError::MissingSource));
    }

    #[test]
    fn both_sources_are_rejected() {
        assert_matches!(
            load(&[("THROTL_VLLM_URL", "http://x"), ("THROTL_MOCK", "1")]),
            Err(ConfigError::ConflictingSources)
        );
    }

    #[test]
    fn invalid_number_names_variable() {
        let err = load(&[("THROTL_MOCK", "true"), ("THROTL_INTERVAL_SECS", "soon")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "THROTL_INTERVAL_SECS", .. });
    }

    #[test]
    fn invalid_bool_is_rejected() {
        assert_matches!(
            load(&[("THROTL_MOCK", "maybe")]),
            Err(ConfigError::Invalid { var: "THROTL_MOCK", .. })
        );
    }

    #[test]
    fn zero_batch_cap_fails_core_validation() {
        assert_matches!(
            load(&[("THROTL_MOCK", "true"), ("THROTL_MAX_BATCH_SIZE", "0")]),
            Err(ConfigError::Core(_))
        );
    }

    #[test]
    fn zero_failure_budget_is_rejected() {
        assert_matches!(
            load(&[("THROTL_MOCK", "true"), ("THROTL_MAX_FAILURES", "0")]),
            Err(ConfigError::Core(_))
        );
    }
}
