//! Saturation (shape) transform
//!
//! BHill(B, K, S, x) = B - K^S * B / (x^S + K^S)
//!
//! - K is the half-saturation point: BHill(B, K, S, K) = B / 2
//! - S < 1 gives a concave C-curve, S > 1 an S-curve with inflection near K
//! - BHill(B, K, S, 0) = 0
//!
//! The function is evaluated in the algebraically identical form
//! B * x^S / (x^S + K^S), for which both BHill(·, 0) = 0 and
//! BHill(·, K) = B / 2 hold exactly in floating point.
//!
//! On the normalized domain x ∈ [0, 1] the response never reaches B: the
//! value at x = 1 is B * (1 - K^S / (1 + K^S)). B is the asymptote as
//! x → ∞, not an attained maximum.

use serde::{Deserialize, Serialize};

use crate::{Result, TransformError};

/// Shape of the response curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveKind {
    /// S <= 1: diminishing returns from the first unit
    Concave,
    /// S > 1: slow start, inflection near K, then saturation
    Sigmoid,
}

/// Saturation configuration for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeParams {
    /// Half-saturation point K > 0
    pub k: f64,
    /// Slope S > 0
    pub s: f64,
    /// Ceiling B
    pub b: f64,
}

impl ShapeParams {
    /// Create shape parameters.
    pub const fn new(k: f64, s: f64, b: f64) -> Self {
        Self { k, s, b }
    }

    /// Shape parameters with the slope held at 1.
    ///
    /// S and K are weakly identified from data; holding S fixed is the
    /// usual way to make K recoverable.
    pub const fn with_fixed_slope(k: f64, b: f64) -> Self {
        Self { k, s: 1.0, b }
    }

    /// Validate K, S and B.
    pub fn validate(&self) -> Result<()> {
        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(TransformError::Domain(format!(
                "Half-saturation K must be finite and > 0, got {}",
                self.k
            )));
        }
        if !self.s.is_finite() || self.s <= 0.0 {
            return Err(TransformError::Domain(format!(
                "Slope S must be finite and > 0, got {}",
                self.s
            )));
        }
        if !self.b.is_finite() {
            return Err(TransformError::Domain(format!(
                "Ceiling B must be finite, got {}",
                self.b
            )));
        }
        Ok(())
    }

    /// Evaluate the response at `x`.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        b_hill(self.b, self.k, self.s, x)
    }

    /// Response at x = 1, the top of the normalized domain.
    pub fn ceiling_at_unit(&self) -> f64 {
        let ks = self.k.powf(self.s);
        self.b * (1.0 - ks / (1.0 + ks))
    }

    /// Curve family implied by the slope.
    pub fn curve_kind(&self) -> CurveKind {
        if self.s > 1.0 {
            CurveKind::Sigmoid
        } else {
            CurveKind::Concave
        }
    }
}

/// Hill-type saturation response.
///
/// # Errors
/// [`TransformError::Domain`] if `x < 0`, `K <= 0`, `S <= 0`, or any input
/// is non-finite.
pub fn b_hill(b: f64, k: f64, s: f64, x: f64) -> Result<f64> {
    ShapeParams::new(k, s, b).validate()?;
    if x.is_nan() || x < 0.0 {
        return Err(TransformError::Domain(format!(
            "Saturation input must be >= 0, got {x}"
        )));
    }

    let xs = x.powf(s);
    let ks = k.powf(s);
    let response = b * (xs / (xs + ks));
    if response.is_finite() {
        Ok(response)
    } else {
        Err(TransformError::Domain(format!(
            "Saturation response overflowed at x = {x} (S = {s})"
        )))
    }
}

/// Apply the response to every value.
pub fn saturate(values: &[f64], params: &ShapeParams) -> Result<Vec<f64>> {
    params.validate()?;
    values.iter().map(|&x| params.evaluate(x)).collect()
}
