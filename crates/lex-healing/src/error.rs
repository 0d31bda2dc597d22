//! Custom error types for the healing engine.
//!
//! This module provides the error hierarchy using `thiserror`. Errors fall
//! into three families:
//!
//! - **Load errors**: the table could not be found, read or parsed. These are
//!   fatal for the scan or heal call that triggered them and are never retried.
//! - **Compute errors**: unexpected failures while computing statistics. Full
//!   scans and heals propagate them; batch analysis downgrades them to a neutral
//!   [`BatchResult`](crate::types::BatchResult).
//! - **State errors**: invalid configuration or stream transitions.
//!
//! Errors are serializable so callers can forward them as `{code, message}`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the healing engine.
#[derive(Error, Debug)]
pub enum HealingError {
    /// Source file does not exist.
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The table could not be read or parsed as CSV.
    #[error("Failed to load table from {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    /// Unexpected failure while computing statistics.
    #[error("Failed to compute statistics: {0}")]
    Compute(String),

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A stream controller transition that is not allowed from the current state.
    #[error("Invalid stream transition: cannot {action} while {state}")]
    InvalidStreamState { action: String, state: String },

    /// The cleaned table could not be written.
    #[error("Failed to persist cleaned table to {}: {reason}", .path.display())]
    Persist { path: PathBuf, reason: String },

    /// A health-check validation did not hold.
    #[error("Health check failed: {0}")]
    HealthCheck(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// CSV reader/writer error wrapper (sampled loads).
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<HealingError>,
    },
}

impl HealingError {
    /// Build a load error for the named source.
    pub fn load(source_name: impl Into<String>, reason: impl ToString) -> Self {
        HealingError::Load {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        HealingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::Load { .. } => "LOAD_ERROR",
            Self::Compute(_) => "COMPUTE_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidStreamState { .. } => "INVALID_STREAM_STATE",
            Self::Persist { .. } => "PERSIST_ERROR",
            Self::HealthCheck(_) => "HEALTH_CHECK_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Csv(_) => "CSV_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error means the input could not be loaded.
    ///
    /// Load errors require the caller to resubmit a corrected source.
    pub fn is_load_error(&self) -> bool {
        match self {
            Self::SourceNotFound(_) | Self::Load { .. } | Self::Csv(_) => true,
            Self::WithContext { source, .. } => source.is_load_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for HealingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("HealingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for healing operations.
pub type Result<T> = std::result::Result<T, HealingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| HealingError::Polars(e).with_context(context))
    }
}
