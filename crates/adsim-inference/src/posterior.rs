//! Posterior estimates returned by an inference engine.

use adsim_design::ModelPayload;
use adsim_series::Channel;
use adsim_transforms::{CarryoverParams, ShapeParams};
use serde::{Deserialize, Serialize};

use crate::{InferenceError, Result};

/// Estimates for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelEstimate {
    /// Channel estimated
    pub channel: Channel,
    /// Carryover rate
    pub rate: f64,
    /// Delay θ, present for a delayed kernel
    pub theta: Option<f64>,
    /// Half-saturation K
    pub k: f64,
    /// Slope S
    pub s: f64,
    /// Ceiling B
    pub b: f64,
    /// Whether S was held fixed rather than estimated
    pub slope_fixed: bool,
}

impl ChannelEstimate {
    /// Carryover parameters for window length `window`.
    pub fn carryover(&self, window: usize) -> CarryoverParams {
        match self.theta {
            Some(theta) => CarryoverParams::delayed(self.rate, theta, window),
            None => CarryoverParams::geometric(self.rate, window),
        }
    }

    /// Saturation parameters.
    pub const fn shape(&self) -> ShapeParams {
        ShapeParams::new(self.k, self.s, self.b)
    }
}

/// Output of a successful fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    engine: String,
    channels: Vec<ChannelEstimate>,
    intercept: f64,
    control_coefficients: Vec<f64>,
    fitted: Vec<f64>,
    rss: f64,
}

impl Posterior {
    /// Build a posterior for `payload`.
    ///
    /// The fitted vector must have one value per payload row, and channels
    /// and control coefficients must match the payload's. The residual sum
    /// of squares is computed here.
    pub fn new(
        engine: impl Into<String>,
        channels: Vec<ChannelEstimate>,
        intercept: f64,
        control_coefficients: Vec<f64>,
        fitted: Vec<f64>,
        payload: &ModelPayload,
    ) -> Result<Self> {
        if fitted.len() != payload.n() {
            return Err(InferenceError::engine_failed(format!(
                "fitted vector has {} values, payload has {} rows",
                fitted.len(),
                payload.n()
            )));
        }
        let estimated: Vec<Channel> = channels.iter().map(|e| e.channel).collect();
        if estimated != payload.channels() {
            return Err(InferenceError::engine_failed(format!(
                "estimated channels {estimated:?} do not match payload channels {:?}",
                payload.channels()
            )));
        }
        if control_coefficients.len() != payload.num_controls() {
            return Err(InferenceError::engine_failed(format!(
                "{} control coefficients for {} controls",
                control_coefficients.len(),
                payload.num_controls()
            )));
        }
        let rss = payload
            .outcome()
            .iter()
            .zip(&fitted)
            .map(|(y, f)| (y - f).powi(2))
            .sum();
        Ok(Self {
            engine: engine.into(),
            channels,
            intercept,
            control_coefficients,
            fitted,
            rss,
        })
    }

    /// Name of the engine that produced this posterior.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Per-channel estimates in payload order.
    pub fn channels(&self) -> &[ChannelEstimate] {
        &self.channels
    }

    /// Estimate for `channel`.
    pub fn estimate(&self, channel: Channel) -> Option<&ChannelEstimate> {
        self.channels.iter().find(|e| e.channel == channel)
    }

    /// Intercept τ.
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// γ per control.
    pub fn control_coefficients(&self) -> &[f64] {
        &self.control_coefficients
    }

    /// Fitted outcome, aligned with the payload outcome.
    pub fn fitted(&self) -> &[f64] {
        &self.fitted
    }

    /// Residual sum of squares.
    pub const fn rss(&self) -> f64 {
        self.rss
    }

    /// Coefficient of determination against `payload`'s outcome.
    pub fn r_squared(&self, payload: &ModelPayload) -> Option<f64> {
        let outcome = payload.outcome();
        let mean = outcome.mean()?;
        let tss: f64 = outcome.iter().map(|y| (y - mean).powi(2)).sum();
        (tss > 0.0).then(|| 1.0 - self.rss / tss)
    }
}
