//! Error types for the refchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each component has its
//! own bounded error; those convert into the top-level [`Error`] taxonomy at
//! component boundaries so the UI layer never sees a raw I/O or parse error.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all refchat operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal to the current initialization; reported, never retried.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Recoverable: proceed with empty or degraded data.
    #[error("Data unavailable: {message}")]
    DataUnavailable { message: String },

    /// Tokenizer / chat oracle failure.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A diagnostic file could not be written. Logged only.
    #[error("Failed to persist {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::DataUnavailable {
            message: message.into(),
        }
    }

    /// Whether the caller may carry on with degraded data.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. } | Self::Persistence { .. })
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("Tables directory not found at {0}")]
    DirectoryMissing(PathBuf),

    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse table {table}: {reason}")]
    Parse { table: String, reason: String },

    #[error("Table {table} row {row}: expected {expected} fields, found {found}")]
    RaggedRow {
        table: String,
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    #[error("Failed to read instruction document at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Marker not found in instruction document: {0:?}")]
    MarkerMissing(String),

    #[error("Marker {marker:?} occurs {count} times in instruction document, expected exactly once")]
    MarkerRepeated { marker: String, count: usize },

    #[error("Marker {end:?} occurs before {start:?}")]
    MarkersOutOfOrder { start: String, end: String },

    #[error("Markers {first:?} and {second:?} overlap")]
    MarkersOverlap { first: String, second: String },
}

impl From<TableError> for Error {
    fn from(err: TableError) -> Self {
        match err {
            TableError::DirectoryMissing(_) => Self::data_unavailable(err.to_string()),
            other => Self::config(other.to_string()),
        }
    }
}

impl From<DocumentError> for Error {
    fn from(err: DocumentError) -> Self {
        Self::config(err.to_string())
    }
}
