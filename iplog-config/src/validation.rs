//! Custom validation functions for configuration.

use std::path::Path;

use validator::ValidationError;

/// Validate that a configured path is not empty.
pub fn validate_path(path: &Path) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::new("empty_path"));
    }
    Ok(())
}

/// Validate the Parquet compression codec name.
pub fn validate_compression(codec: &str) -> Result<(), ValidationError> {
    if ["snappy", "zstd", "none"].contains(&codec.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_compression"))
    }
}

/// Validate a default log level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
