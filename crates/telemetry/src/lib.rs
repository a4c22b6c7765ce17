//! Logging and usage tracking for refchat.
//!
//! Sets up the `tracing` subscriber (console, detailed JSON file, request
//! log) and keeps running token totals for a chat session.

pub mod logging;
pub mod usage;

pub use logging::{LogGuards, REQUEST_TARGET, init_logging, log_request};
pub use usage::SessionUsage;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("cannot create log directory {path}: {reason}")]
    LogDirectory { path: String, reason: String },

    #[error("cannot open log file {file}: {reason}")]
    LogFile { file: String, reason: String },
}
