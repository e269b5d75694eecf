//! Shared threshold validation helpers.
//!
//! Provides reusable range-checking functions for assembler settings and
//! the agent configuration built on top of them.

use crate::error::CoreError;

/// Validate that a value is finite and not negative.
pub fn validate_non_negative(value: f64, name: &str) -> Result<(), CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite value >= 0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a count is at least 1.
pub fn validate_positive_count(value: u32, name: &str) -> Result<(), CoreError> {
    if value == 0 {
        return Err(CoreError::Validation(format!("{name} must be at least 1")));
    }
    Ok(())
}
