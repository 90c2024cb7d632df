//! Error types for series operations.

use thiserror::Error;

/// Result type for series operations.
pub type Result<T> = std::result::Result<T, SeriesError>;

/// Errors that can occur while building, generating or normalizing series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    /// Invalid generation parameters, rejected before any simulation runs
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// AR polynomial has a root inside or on the unit circle
    #[error(
        "Non-stationary AR specification: partial autocorrelation {coefficient} at lag {lag} has magnitude >= 1"
    )]
    NonStationary {
        /// Lag at which the step-down recursion failed
        lag: usize,
        /// Offending partial autocorrelation
        coefficient: f64,
    },

    /// Operation applied outside its valid input domain
    #[error("Domain error: {0}")]
    Domain(String),

    /// Observations are not strictly increasing and gap-free
    #[error("Period {found} out of sequence, expected {expected}")]
    PeriodGap {
        /// Period index expected at this position
        expected: usize,
        /// Period index actually found
        found: usize,
    },
}

impl SeriesError {
    /// Whether this error was raised by configuration validation.
    pub const fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NonStationary { .. } | Self::PeriodGap { .. }
        )
    }

    /// Whether this error was raised by a domain check.
    pub const fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}
