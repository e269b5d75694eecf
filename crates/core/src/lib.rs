//! `throtl-core` -- pure analysis logic for LLM inference server telemetry.
//!
//! Parses the text exposition a vLLM server emits, estimates latency
//! percentiles from histogram buckets, assembles normalized [`Snapshot`]s,
//! and runs the health rules, config advisor, and before/after comparison
//! over them. Nothing in this crate performs I/O or keeps state between
//! calls; scraping, GPU telemetry and scheduling belong to the caller.

pub mod assembler;
pub mod comparison;
pub mod config_advisor;
pub mod error;
pub mod exposition;
pub mod gpu;
pub mod metric_names;
pub mod quantile;
pub mod recommendations;
pub mod snapshot;
pub mod threshold_validation;
pub mod types;

pub use assembler::assemble;
pub use comparison::{compare, ComparisonReport, MetricDelta};
pub use config_advisor::{advise, ConfigSuggestion};
pub use error::CoreError;
pub use exposition::{parse, MetricFamilies, MetricFamily, MetricSample};
pub use gpu::GpuReading;
pub use quantile::histogram_percentile;
pub use recommendations::{analyze, Recommendation, Severity};
pub use snapshot::{AssemblerSettings, Snapshot};
