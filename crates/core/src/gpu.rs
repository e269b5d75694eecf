//! GPU telemetry supplied to the snapshot assembler by the caller.

use serde::{Deserialize, Serialize};

/// One reading of a single GPU.
///
/// Acquisition (NVML or otherwise) happens outside this crate; the
/// assembler only merges the values into a [`crate::snapshot::Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    /// Compute utilization as a fraction in `[0, 1]`.
    pub utilization: f64,
    pub memory_used_gb: f64,
    pub memory_total_gb: f64,
}
