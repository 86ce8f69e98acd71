//! Tracing/logging setup shared by binaries, tests and benches.

/// Log settings read from the environment.
pub mod config;

/// Tracing subscriber installation (filters, output format).
pub mod tracing;

pub use config::{ConfigError, LogFormat, ObservabilityConfig};

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops. An unreadable
/// `DDDKIT_LOG_FORMAT` falls back to the default format.
pub fn init() {
    let config = ObservabilityConfig::from_env().unwrap_or_default();
    tracing::init(&config);
}

/// Initialize process-wide tracing with explicit settings.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init(config);
}
