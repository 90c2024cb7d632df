//! Error types for design assembly.

use adsim_series::SeriesError;
use adsim_transforms::TransformError;
use thiserror::Error;

/// Result type for design assembly.
pub type Result<T> = std::result::Result<T, DesignError>;

/// Errors raised while configuring a run or assembling its design.
#[derive(Debug, Error)]
pub enum DesignError {
    /// Series generation or normalization failed
    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    /// Carryover or saturation failed
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Inputs or payload disagree on a dimension
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    Shape {
        /// Which dimension disagreed
        what: String,
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Payload tensor does not hold the raw exposure values
    #[error("Payload is not built from raw exposures: {0}")]
    NotRaw(String),

    /// Configuration (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesignError {
    /// Shorthand for a shape mismatch.
    pub fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Shape {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Whether this error came from configuration or shape validation.
    pub const fn is_config(&self) -> bool {
        match self {
            Self::Config(_) | Self::Shape { .. } => true,
            Self::Series(e) => e.is_config(),
            Self::Transform(e) => e.is_config(),
            _ => false,
        }
    }

    /// Whether this error came from a transform domain check.
    pub const fn is_domain(&self) -> bool {
        match self {
            Self::Series(e) => e.is_domain(),
            Self::Transform(e) => e.is_domain(),
            _ => false,
        }
    }

    /// Whether this error came from an unfillable trailing window.
    pub const fn is_window(&self) -> bool {
        matches!(self, Self::Transform(e) if e.is_window())
    }
}
