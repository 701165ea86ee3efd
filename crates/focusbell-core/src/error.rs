//! Core error types for focusbell-core.
//!
//! Every public operation of the library returns either a plain success
//! indicator or one of these typed failures; nothing is allowed to panic
//! across the crate boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for focusbell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid numeric input or mode definition
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Statistics document could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fault raised inside the tick loop
    #[error("Scheduler fault: {0}")]
    Scheduler(#[from] SchedulerFault),

    /// `start()` while a session is already Running or Paused
    #[error("A session is already {state}; stop it before starting another")]
    ConcurrencyConflict { state: String },

    /// Custom-mode mutation attempted while a session holds the mode lock
    #[error("Custom modes are locked while mode '{mode}' is in use")]
    ModesLocked { mode: String },

    /// Referenced custom mode does not exist
    #[error("Custom mode not found: {0}")]
    ModeNotFound(String),

    /// Operation requires a tokio runtime but none is active
    #[error("No async runtime available to drive the session")]
    NoRuntime,
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Numeric parameter outside its allowed range
    #[error("Invalid value for '{field}': {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Statistics document errors.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to read the document
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the document
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid JSON or does not match the schema
    #[error("Failed to parse {path}: {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Migration step rejected the document
    #[error("Schema migration to v{version} failed: {message}")]
    MigrationFailed { version: u32, message: String },

    /// Failed to serialize the document
    #[error("Failed to serialize statistics: {0}")]
    Serialize(#[from] serde_json::Error),

    /// No data directory could be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Faults observed inside the tick loop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerFault {
    /// Timestamp arithmetic overflowed
    #[error("Clock arithmetic overflow while computing {0}")]
    ClockOverflow(&'static str),

    /// A tick panicked (including panics raised by the notifier)
    #[error("Tick panicked: {0}")]
    Panicked(String),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

impl CoreError {
    /// Short message suitable for surfacing directly to a user.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Validation(e) => e.to_string(),
            CoreError::ConcurrencyConflict { .. } => "A session is already in progress".into(),
            CoreError::ModesLocked { .. } => "Custom modes cannot be edited during a session".into(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::OutOfRange {
            field: "total_minutes",
            value: 0,
            min: 1,
            max: 1440,
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(err.user_message().contains("total_minutes"));
    }

    #[test]
    fn conflict_has_short_user_message() {
        let err = CoreError::ConcurrencyConflict {
            state: "running".into(),
        };
        assert_eq!(err.user_message(), "A session is already in progress");
    }
}
