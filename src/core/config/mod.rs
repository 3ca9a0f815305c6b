pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};

/// Hard floor for rejection and dispute reasons, in characters. Deployments
/// may raise the configured minimum but never lower it past this.
pub const MIN_REJECTION_REASON_CHARS: usize = 20;

/// Main foreman configuration loaded from foreman.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ForemanConfig {
    /// Payload validation rules
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Pool coordinator behavior
    #[serde(default)]
    pub pool: PoolConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Payload validation rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum rejection/dispute reason length in characters
    #[serde(default = "default_min_rejection_reason_chars")]
    pub min_rejection_reason_chars: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_rejection_reason_chars: default_min_rejection_reason_chars(),
        }
    }
}

/// Pool coordinator behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Notify claimants whose requests are dropped when a task leaves the
    /// pool on claim approval
    #[serde(default = "default_notify_dropped_claims")]
    pub notify_dropped_claims: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            notify_dropped_claims: default_notify_dropped_claims(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via FOREMAN_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_min_rejection_reason_chars() -> usize {
    MIN_REJECTION_REASON_CHARS
}

fn default_notify_dropped_claims() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}
