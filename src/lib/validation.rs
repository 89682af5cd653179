//! Input validation utilities for CLI parameters and files.

use anyhow::{Result, bail};
use std::path::Path;

/// Validates that a file exists, with a descriptive error message.
///
/// # Errors
///
/// Returns an error naming the file's role when it does not exist.
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("{description} file does not exist: {}", path.display());
    }
    if !path.is_file() {
        bail!("{description} path is not a file: {}", path.display());
    }
    Ok(())
}

/// Validates that a probability parameter lies in `(0, 1)`.
///
/// # Errors
///
/// Returns an error naming the parameter when the value is out of range.
pub fn validate_probability(value: f64, parameter: &str) -> Result<()> {
    if !(value > 0.0 && value < 1.0) {
        bail!("Invalid parameter '{parameter}': {value} (must be between 0 and 1, exclusive)");
    }
    Ok(())
}
