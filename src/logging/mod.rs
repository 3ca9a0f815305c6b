//! Logging bootstrap for embedders.
//!
//! The engine itself only emits `tracing` events; installing a subscriber
//! is the host process's call. This helper wires the standard setup:
//! an `EnvFilter` seeded from configuration, overridable at runtime via
//! `FOREMAN_LOG`, with either human-readable or JSON output.

use crate::core::config::LoggingConfig;
use crate::Result;
use anyhow::anyhow;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize the global tracing subscriber.
///
/// Errors when invoked more than once per process; installing a second
/// global subscriber would silently drop one of them.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let filter = env::var("FOREMAN_LOG").unwrap_or_else(|_| config.filter.clone());
    let env_filter = EnvFilter::try_new(&filter)
        .map_err(|e| anyhow!("invalid log filter {:?}: {}", filter, e))?;

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .try_init()
            .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init()
            .map_err(|e| anyhow!("failed to install subscriber: {}", e))?;
    }

    Ok(())
}
