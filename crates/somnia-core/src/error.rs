//! Core error types for somnia-core.
//!
//! This module defines the error hierarchy using thiserror. Scheduling
//! failures are surfaced to the caller, never retried inside the core;
//! retry/backoff, if wanted, belongs to a scheduler implementation.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for somnia-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Alarm scheduler errors
    #[error("Scheduling error: {0}")]
    Scheduling(#[from] SchedulingError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Monitor lifecycle errors
    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alarm scheduler boundary errors.
///
/// The state machine records the attempted deadline optimistically even
/// when one of these is returned; the only desynchronization signal in
/// scope is the alarm-fired notification never arriving.
#[derive(Error, Debug)]
pub enum SchedulingError {
    /// The underlying timer facility rejected the registration
    #[error("Failed to register deadline: {0}")]
    RegisterFailed(String),

    /// The underlying timer facility rejected the cancellation
    #[error("Failed to cancel deadline: {0}")]
    CancelFailed(String),

    /// The deadline-reached consumer is gone
    #[error("Deadline notification channel closed")]
    NotifyClosed,
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// The persisted record could not be decoded
    #[error("Corrupt persisted record: {0}")]
    CorruptRecord(String),

    /// Filesystem errors around the data directory
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Monitor lifecycle errors.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// The activity event source is unavailable; monitoring does not start.
    #[error("Activity source unavailable: {0}")]
    PermissionDenied(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::QueryFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
