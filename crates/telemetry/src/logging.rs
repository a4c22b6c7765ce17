//! Subscriber setup.
//!
//! Three outputs:
//! - console (stderr), compact, filtered by `RUST_LOG` or the configured level
//! - `<dir>/<detailed_file>`, JSON lines with span fields, rolled daily
//! - `<dir>/<requests_file>`, one line per chat request (target [`REQUEST_TARGET`])

use crate::TelemetryError;
use refchat_config::LoggingConfig;
use std::path::Path;
use tracing::Metadata;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Target of request-log events.
pub const REQUEST_TARGET: &str = "refchat::requests";

/// Keeps the background log writers alive; drop it to flush them.
#[must_use = "dropping the guards stops file logging"]
#[derive(Default)]
pub struct LogGuards {
    guards: Vec<WorkerGuard>,
}

impl LogGuards {
    /// Whether file logging is active.
    pub fn has_files(&self) -> bool {
        !self.guards.is_empty()
    }
}

/// Record one chat request in the request log.
pub fn log_request(session_id: &str, question_chars: usize) {
    tracing::info!(target: REQUEST_TARGET, session_id, question_chars, "request");
}

fn is_request(meta: &Metadata<'_>) -> bool {
    meta.target() == REQUEST_TARGET
}

/// The level used when `RUST_LOG` is unset.
fn default_directive(config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else {
        config.level.clone()
    }
}

fn env_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

struct FileWriters {
    detailed: NonBlocking,
    requests: NonBlocking,
    guards: Vec<WorkerGuard>,
}

fn open_file_writers(config: &LoggingConfig, dir: &Path) -> Result<FileWriters, TelemetryError> {
    std::fs::create_dir_all(dir).map_err(|e| TelemetryError::LogDirectory {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let appender = |file: &str| {
        RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(file)
            .build(dir)
            .map_err(|e| TelemetryError::LogFile {
                file: file.to_string(),
                reason: e.to_string(),
            })
    };

    let (detailed, detailed_guard) = tracing_appender::non_blocking(appender(&config.detailed_file)?);
    let (requests, requests_guard) = tracing_appender::non_blocking(appender(&config.requests_file)?);

    Ok(FileWriters {
        detailed,
        requests,
        guards: vec![detailed_guard, requests_guard],
    })
}

/// Install the global subscriber.
///
/// `log_dir` is the resolved log directory. When it cannot be created the
/// run continues with console logging only. Calling this twice leaves the
/// first subscriber in place.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path, verbose: bool) -> LogGuards {
    let directive = default_directive(config, verbose);

    let console = config.console.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(env_filter(&directive))
            .with_filter(filter_fn(|meta| !is_request(meta)))
    });

    let (files, file_error) = match open_file_writers(config, log_dir) {
        Ok(files) => (Some(files), None),
        Err(e) => (None, Some(e)),
    };

    let (detailed, requests, guards) = match files {
        Some(files) => {
            let detailed = fmt::layer()
                .json()
                .with_writer(files.detailed)
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(true)
                .with_filter(env_filter(&directive));
            let requests = fmt::layer()
                .with_writer(files.requests)
                .with_ansi(false)
                .with_target(false)
                .with_level(false)
                .with_filter(filter_fn(is_request));
            (Some(detailed), Some(requests), files.guards)
        }
        None => (None, None, Vec::new()),
    };

    let installed = tracing_subscriber::registry()
        .with(console)
        .with(detailed)
        .with(requests)
        .try_init()
        .is_ok();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "File logging disabled, logging to console only");
    } else if installed {
        tracing::debug!(dir = %log_dir.display(), "File logging enabled");
    }

    LogGuards { guards }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_forces_debug() {
        let config = LoggingConfig::default();
        assert_eq!(default_directive(&config, true), "debug");
        assert_eq!(default_directive(&config, false), config.level);
    }

    #[test]
    fn opens_writers_in_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let writers = open_file_writers(&LoggingConfig::default(), &log_dir).unwrap();
        assert_eq!(writers.guards.len(), 2);
        assert!(log_dir.is_dir());
    }

    #[test]
    fn unusable_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = open_file_writers(&LoggingConfig::default(), &blocker).err().unwrap();
        assert!(matches!(err, TelemetryError::LogDirectory { .. }));
    }

    #[test]
    fn init_falls_back_to_console_only() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "x").unwrap();

        let guards = init_logging(&LoggingConfig::default(), &blocker, false);
        assert!(!guards.has_files());
    }
}
