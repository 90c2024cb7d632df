//! Error types for inference.

use std::time::Duration;

use thiserror::Error;

/// Result type for inference.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Why no posterior was produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnavailableReason {
    /// The engine did not finish within the deadline
    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    /// The caller cancelled the fit
    #[error("cancelled")]
    Cancelled,

    /// The engine failed or panicked
    #[error("engine failed: {0}")]
    EngineFailed(String),
}

/// Errors raised at the inference boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// No posterior is available; the payload itself was fine
    #[error("Inference unavailable: {reason}")]
    Unavailable {
        /// Cause
        reason: UnavailableReason,
    },

    /// The payload violates the data contract
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The engine is misconfigured
    #[error("Invalid engine configuration: {0}")]
    Config(String),
}

impl InferenceError {
    /// Shorthand for an engine failure.
    pub fn engine_failed(message: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: UnavailableReason::EngineFailed(message.into()),
        }
    }

    /// Whether no posterior is available for a reason other than the payload.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
