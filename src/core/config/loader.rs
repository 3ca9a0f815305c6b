#![allow(clippy::result_large_err)]

use super::ForemanConfig;
use crate::core::error::AppError;
use std::env;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from a workspace root (workspace/foreman.toml).
    /// Environment variables override config file values.
    /// A missing file means defaults + env vars.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<ForemanConfig, AppError> {
        let config_path = workspace_path.join("foreman.toml");
        let config_file = Self::load_from_file(&config_path)?;

        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Load config from a specific file path.
    /// Returns Ok(None) if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<ForemanConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                crate::core::types::ErrorCategory::InternalError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: ForemanConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration.
    /// Environment variables take precedence over config file values.
    fn apply_env_overrides(config: &mut ForemanConfig) {
        if let Ok(min_chars_str) = env::var("FOREMAN_MIN_REJECTION_REASON_CHARS") {
            if let Ok(min_chars) = min_chars_str.parse::<usize>() {
                config.validation.min_rejection_reason_chars = min_chars;
            }
        }

        if let Ok(notify_str) = env::var("FOREMAN_NOTIFY_DROPPED_CLAIMS") {
            if let Ok(notify) = notify_str.parse::<bool>() {
                config.pool.notify_dropped_claims = notify;
            }
        }

        if let Ok(filter) = env::var("FOREMAN_LOG_FILTER") {
            config.logging.filter = filter;
        }

        if let Ok(json_str) = env::var("FOREMAN_LOG_JSON") {
            if let Ok(json) = json_str.parse::<bool>() {
                config.logging.json = json;
            }
        }
    }
}
