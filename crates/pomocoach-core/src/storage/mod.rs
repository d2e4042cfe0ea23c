mod config;

pub use config::{CliConfig, EngineConfig};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/pomocoach[-dev]/` based on POMOCOACH_ENV.
///
/// Set POMOCOACH_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOCOACH_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomocoach-dev")
    } else {
        base_dir.join("pomocoach")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DirectoryUnavailable(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
