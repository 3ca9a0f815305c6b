#![allow(clippy::result_large_err)]

use super::{ForemanConfig, MIN_REJECTION_REASON_CHARS};
use crate::core::error::AppError;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &ForemanConfig) -> Result<(), AppError> {
        if config.validation.min_rejection_reason_chars < MIN_REJECTION_REASON_CHARS {
            return Err(AppError::new(
                crate::core::types::ErrorCategory::ValidationError,
                format!(
                    "validation.min_rejection_reason_chars cannot be lower than {}",
                    MIN_REJECTION_REASON_CHARS
                ),
            ));
        }

        if config.logging.filter.trim().is_empty() {
            return Err(AppError::new(
                crate::core::types::ErrorCategory::ValidationError,
                "logging.filter cannot be empty",
            ));
        }

        Ok(())
    }
}
