use std::collections::HashSet;
use std::path::Path;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - `dest_path` is set and is an existing directory
/// - `temp_path`, when set, is an existing directory
/// - Polling timeout and delay are not 0
/// - Category labels are non-empty and distinct
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.dest_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "dest_path is required".to_string(),
        ));
    }
    check_dir("dest_path", &config.dest_path)?;

    if let Some(temp) = &config.temp_path {
        check_dir("temp_path", temp)?;
    }

    if config.polling.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "polling.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.polling.delay_secs == 0 {
        return Err(ConfigError::ValidationError(
            "polling.delay_secs cannot be 0".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for label in config.categories.all() {
        if label.is_empty() {
            return Err(ConfigError::ValidationError(
                "category labels cannot be empty".to_string(),
            ));
        }
        if !seen.insert(label) {
            return Err(ConfigError::ValidationError(format!(
                "category label '{}' is used more than once",
                label
            )));
        }
    }

    Ok(())
}

fn check_dir(name: &str, path: &Path) -> Result<(), ConfigError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        ConfigError::ValidationError(format!("{} ({}): {}", name, path.display(), e))
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::ValidationError(format!(
            "{} ({}) is not a directory",
            name,
            path.display()
        )));
    }
    Ok(())
}
