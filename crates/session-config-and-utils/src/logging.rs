//! Logging initialization.
//!
//! Thin wrapper over the observability crate so binaries configure logging
//! in one call.

use observability::LogConfig;
use std::path::PathBuf;

/// Initialize logging.
///
/// Structured JSONL goes to `log_path`; a compact human-readable copy goes to
/// stderr. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    observability::init_with_config(LogConfig {
        service_name: "session-doctor".into(),
        default_level: level.into(),
        log_path,
        also_stderr: std::env::var("SESSION_DOCTOR_QUIET").is_err(),
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
