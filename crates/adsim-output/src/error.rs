//! Error types for persistence and export.

use adsim_design::DesignError;
use thiserror::Error;

/// Result type for persistence and export.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that can occur while writing, reading or exporting.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFrame construction error.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A read dataset failed validation.
    #[error("Dataset error: {0}")]
    Design(#[from] DesignError),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl<W> From<csv::IntoInnerError<W>> for ExportError {
    fn from(err: csv::IntoInnerError<W>) -> Self {
        Self::Io(err.into_error())
    }
}
