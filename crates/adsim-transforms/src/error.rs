//! Error types for transform operations.

use thiserror::Error;

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

/// Errors raised by carryover and saturation transforms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Invalid transform parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Input outside the transform's valid domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Not enough history to fill the trailing window
    #[error(
        "Insufficient history at period {period}: window of {window} periods, series has {available}"
    )]
    Window {
        /// Period the window ends at
        period: usize,
        /// Requested window length
        window: usize,
        /// Number of periods available in the series
        available: usize,
    },
}

impl TransformError {
    /// Whether this error came from parameter validation.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Whether this error came from a domain check.
    pub const fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }

    /// Whether this error came from an unfillable window.
    pub const fn is_window(&self) -> bool {
        matches!(self, Self::Window { .. })
    }
}
