//! NVML-based GPU telemetry.
//!
//! [`GpuMonitor`] wraps the NVIDIA Management Library and reads one
//! device's utilization and memory for the snapshot assembler.
//!
//! NVML initialisation is **gracefully optional** -- if the host has no
//! NVIDIA drivers (e.g. a developer laptop), the monitor logs a warning
//! and every read returns `None` instead of panicking.

use nvml_wrapper::error::NvmlError;
use nvml_wrapper::Nvml;
use throtl_core::GpuReading;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Reads telemetry for a single GPU by index.
pub struct GpuMonitor {
    /// `None` when NVML could not be initialised (no drivers / no GPU).
    nvml: Option<Nvml>,
    device_index: u32,
}

impl GpuMonitor {
    /// Attempt to initialise NVML for `device_index`.
    pub fn new(device_index: u32) -> Self {
        let nvml = match Nvml::init() {
            Ok(nvml) => {
                tracing::info!(device_index, "NVML initialised successfully");
                Some(nvml)
            }
            Err(e) => {
                tracing::warn!(error = %e, "NVML unavailable -- GPU telemetry will be zero");
                None
            }
        };
        Self { nvml, device_index }
    }

    /// A monitor that never reports telemetry.
    pub fn disabled() -> Self {
        Self {
            nvml: None,
            device_index: 0,
        }
    }

    /// Whether NVML was initialised.
    pub fn is_available(&self) -> bool {
        self.nvml.is_some()
    }

    /// Read the device, or `None` when NVML is unavailable or the read fails.
    pub fn read(&self) -> Option<GpuReading> {
        let nvml = self.nvml.as_ref()?;

        match self.read_device(nvml) {
            Ok(reading) => Some(reading),
            Err(e) => {
                tracing::warn!(
                    device_index = self.device_index,
                    error = %e,
                    "GPU telemetry read failed",
                );
                None
            }
        }
    }

    fn read_device(&self, nvml: &Nvml) -> Result<GpuReading, NvmlError> {
        let device = nvml.device_by_index(self.device_index)?;

        let mem_info = device.memory_info()?;
        let utilization = device.utilization_rates()?;

        Ok(GpuReading {
            utilization: f64::from(utilization.gpu) / 100.0,
            memory_used_gb: mem_info.used as f64 / BYTES_PER_GB,
            memory_total_gb: mem_info.total as f64 / BYTES_PER_GB,
        })
    }
}
