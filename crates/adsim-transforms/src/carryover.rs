//! Carryover (adstock) transforms
//!
//! Both decay kernels are evaluated over a right-aligned trailing window of
//! width L. With lag l = 0 at the current period and l increasing backwards
//! in time, the output at period t is
//!
//! carryover_t = Σ w(l) * x_{t-l} / Σ w(l),  l = 0..L-1
//!
//! Geometric decay uses w(l) = rate^l. Delayed decay uses
//! w(l) = rate^((l - θ)^2), which peaks at lag θ. θ = 0 is the degenerate
//! case of the delayed kernel and evaluates to the geometric weights exactly.
//!
//! The output is only defined for t >= L - 1; earlier periods are reported
//! as [`TransformError::Window`] by [`apply_at`] and skipped by
//! [`carryover`].

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, TransformError};

/// Decay kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayKind {
    /// w(l) = rate^l
    #[default]
    Geometric,
    /// w(l) = rate^((l - θ)^2)
    Delayed,
}

/// Carryover configuration for one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarryoverParams {
    /// Decay kernel
    pub algorithm: DecayKind,
    /// Retention rate in (0, 1)
    pub rate: f64,
    /// Lag of peak effect (delayed kernel only)
    #[serde(default)]
    pub theta: f64,
    /// Trailing window length L
    pub window: usize,
}

impl CarryoverParams {
    /// Geometric decay parameters.
    pub const fn geometric(rate: f64, window: usize) -> Self {
        Self {
            algorithm: DecayKind::Geometric,
            rate,
            theta: 0.0,
            window,
        }
    }

    /// Delayed decay parameters.
    pub const fn delayed(rate: f64, theta: f64, window: usize) -> Self {
        Self {
            algorithm: DecayKind::Delayed,
            rate,
            theta,
            window,
        }
    }

    /// Validate rate, θ and window length.
    pub fn validate(&self) -> Result<()> {
        if !(self.rate > 0.0 && self.rate < 1.0) {
            return Err(TransformError::Config(format!(
                "Carryover rate must be in (0, 1), got {}",
                self.rate
            )));
        }
        if self.window == 0 {
            return Err(TransformError::Config(
                "Window length must be >= 1".to_string(),
            ));
        }
        if !self.theta.is_finite() || self.theta < 0.0 {
            return Err(TransformError::Config(format!(
                "Theta must be finite and >= 0, got {}",
                self.theta
            )));
        }
        if self.algorithm == DecayKind::Geometric && self.theta != 0.0 {
            return Err(TransformError::Config(format!(
                "Theta is only meaningful for delayed decay, got {} with geometric decay",
                self.theta
            )));
        }
        Ok(())
    }

    /// Kernel weights indexed by lag (index 0 = current period).
    pub fn weights(&self) -> Result<Array1<f64>> {
        self.validate()?;
        let weights = match self.algorithm {
            DecayKind::Delayed if self.theta != 0.0 => {
                Array1::from_iter((0..self.window).map(|l| {
                    let distance = l as f64 - self.theta;
                    self.rate.powf(distance * distance)
                }))
            }
            DecayKind::Geometric | DecayKind::Delayed => geometric_weights(self.rate, self.window),
        };
        Ok(weights)
    }

    /// Lag carrying the largest weight.
    pub fn peak_lag(&self) -> usize {
        match self.algorithm {
            DecayKind::Geometric => 0,
            DecayKind::Delayed => (self.theta.round() as usize).min(self.window.saturating_sub(1)),
        }
    }

    /// Periods until a geometric kernel's weight halves.
    ///
    /// `None` for the delayed kernel, whose weights are not monotone.
    pub fn half_life(&self) -> Option<f64> {
        match self.algorithm {
            DecayKind::Geometric => Some(0.5_f64.ln() / self.rate.ln()),
            DecayKind::Delayed => None,
        }
    }
}

/// Carryover output for one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowedValue {
    /// Period the window ends at
    pub period: usize,
    /// Weighted window average
    pub value: f64,
}

fn geometric_weights(rate: f64, window: usize) -> Array1<f64> {
    Array1::from_iter((0..window).map(|l| rate.powi(l as i32)))
}

fn weight_total(weights: &Array1<f64>) -> Result<f64> {
    let total = weights.sum();
    if total > 0.0 && total.is_finite() {
        Ok(total)
    } else {
        Err(TransformError::Domain(format!(
            "Carryover weights sum to {total}; kernel underflowed"
        )))
    }
}

/// Weighted average of a window stored oldest-first.
fn window_average(window: &[f64], weights: &Array1<f64>) -> Result<f64> {
    debug_assert_eq!(window.len(), weights.len());
    if window.iter().any(|v| !v.is_finite()) {
        return Err(TransformError::Domain(
            "Carryover window contains non-finite values".to_string(),
        ));
    }
    let total = weight_total(weights)?;
    let acc: f64 = weights
        .iter()
        .zip(window.iter().rev())
        .map(|(w, v)| w * v)
        .sum();
    Ok(acc / total)
}

/// Weighted average of lag-ordered values (index 0 = current period).
///
/// This is the layout of one channel's slice of the inference payload.
pub fn weighted_lag_average(lags: ArrayView1<'_, f64>, weights: &Array1<f64>) -> Result<f64> {
    if lags.len() != weights.len() {
        return Err(TransformError::Config(format!(
            "Lag vector has {} entries, kernel has {}",
            lags.len(),
            weights.len()
        )));
    }
    let total = weight_total(weights)?;
    Ok(lags.dot(weights) / total)
}

/// Carryover value at period `t` of `values`.
///
/// # Errors
/// [`TransformError::Window`] if `t < L - 1` or `t` is past the end of the
/// series.
pub fn apply_at(values: &[f64], t: usize, params: &CarryoverParams) -> Result<f64> {
    let weights = params.weights()?;
    let window = trailing(values, t, params.window)?;
    window_average(window, &weights)
}

fn trailing(values: &[f64], t: usize, window: usize) -> Result<&[f64]> {
    let insufficient = || TransformError::Window {
        period: t,
        window,
        available: values.len(),
    };
    if t >= values.len() {
        return Err(insufficient());
    }
    let start = (t + 1).checked_sub(window).ok_or_else(insufficient)?;
    Ok(&values[start..=t])
}

/// Carryover over every period with a complete window.
///
/// Returns one value per period t in L-1..len; empty when the series is
/// shorter than the window.
pub fn carryover(values: &[f64], params: &CarryoverParams) -> Result<Vec<WindowedValue>> {
    let weights = params.weights()?;
    let first = params.window - 1;

    let out = (first..values.len())
        .map(|t| {
            let window = &values[t + 1 - params.window..=t];
            window_average(window, &weights).map(|value| WindowedValue { period: t, value })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        algorithm = ?params.algorithm,
        rate = params.rate,
        theta = params.theta,
        window = params.window,
        periods = out.len(),
        "applied carryover"
    );
    Ok(out)
}

/// Geometric decay over a single window stored oldest-first.
///
/// The window length is taken as L.
pub fn geometric_decay(rate: f64, window: &[f64]) -> Result<f64> {
    let params = CarryoverParams::geometric(rate, window.len());
    window_average(window, &params.weights()?)
}

/// Delayed decay over a single window stored oldest-first.
pub fn delayed_decay(rate: f64, theta: f64, window: &[f64]) -> Result<f64> {
    let params = CarryoverParams::delayed(rate, theta, window.len());
    window_average(window, &params.weights()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::{Rng, SeedableRng, rngs::StdRng};
    use rstest::rstest;

    const WINDOW: [f64; 6] = [4.0, -2.0, 7.5, 0.25, 3.0, 9.0];

    #[test]
    fn test_geometric_weights() {
        let weights = CarryoverParams::geometric(0.5, 4).weights().unwrap();
        assert_eq!(weights.to_vec(), vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn test_rate_near_one_is_window_mean() {
        let mean = WINDOW.iter().sum::<f64>() / WINDOW.len() as f64;
        let value = geometric_decay(0.999_999, &WINDOW).unwrap();
        assert_abs_diff_eq!(value, mean, epsilon = 1e-4);
    }

    #[test]
    fn test_rate_near_zero_is_latest_value() {
        let value = geometric_decay(1e-9, &WINDOW).unwrap();
        assert_abs_diff_eq!(value, 9.0, epsilon = 1e-7);
    }

    #[test]
    fn test_delayed_theta_zero_equals_geometric_exactly() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let len = rng.gen_range(1..16);
            let window: Vec<f64> = (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect();
            let rate = rng.gen_range(0.01..0.99);
            let geometric = geometric_decay(rate, &window).unwrap();
            let delayed = delayed_decay(rate, 0.0, &window).unwrap();
            assert_eq!(geometric.to_bits(), delayed.to_bits());
        }
    }

    #[rstest]
    #[case(0.6, 2.0, 6)]
    #[case(0.3, 3.0, 8)]
    #[case(0.9, 1.0, 4)]
    fn test_delayed_peak_at_theta(#[case] rate: f64, #[case] theta: f64, #[case] window: usize) {
        let params = CarryoverParams::delayed(rate, theta, window);
        let weights = params.weights().unwrap();
        let argmax = weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(l, _)| l)
            .unwrap();
        assert_eq!(argmax, params.peak_lag());
        assert_relative_eq!(weights[theta as usize], 1.0);
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.2)]
    #[case(f64::NAN)]
    fn test_invalid_rate(#[case] rate: f64) {
        let err = CarryoverParams::geometric(rate, 3).validate().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_invalid_window_and_theta() {
        assert!(CarryoverParams::geometric(0.5, 0).validate().is_err());
        assert!(CarryoverParams::delayed(0.5, -1.0, 3).validate().is_err());
        let mut params = CarryoverParams::geometric(0.5, 3);
        params.theta = 1.0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_apply_at_requires_full_window() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let params = CarryoverParams::geometric(0.5, 3);
        let err = apply_at(&values, 1, &params).unwrap_err();
        assert_eq!(
            err,
            TransformError::Window {
                period: 1,
                window: 3,
                available: 4
            }
        );
        assert!(apply_at(&values, 4, &params).unwrap_err().is_window());

        // (4 + 0.5 * 3 + 0.25 * 2) / 1.75
        assert_relative_eq!(apply_at(&values, 3, &params).unwrap(), 6.0 / 1.75);
    }

    #[test]
    fn test_carryover_skips_incomplete_periods() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let params = CarryoverParams::geometric(0.7, 4);
        let out = carryover(&values, &params).unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out[0].period, 3);
        for w in &out {
            assert_eq!(w.value, apply_at(&values, w.period, &params).unwrap());
        }
    }

    #[test]
    fn test_carryover_short_series_is_empty() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = carryover(&values, &CarryoverParams::geometric(0.5, 13)).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_lag_average_matches_window_average() {
        let params = CarryoverParams::delayed(0.7, 1.5, WINDOW.len());
        let weights = params.weights().unwrap();
        let lags = Array1::from_iter(WINDOW.iter().rev().copied());
        let from_lags = weighted_lag_average(lags.view(), &weights).unwrap();
        let from_window = delayed_decay(0.7, 1.5, &WINDOW).unwrap();
        assert_relative_eq!(from_lags, from_window, epsilon = 1e-12);
    }

    #[test]
    fn test_underflowing_kernel_is_domain_error() {
        let err = delayed_decay(1e-300, 50.0, &[1.0, 2.0]).unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn test_half_life() {
        let half_life = CarryoverParams::geometric(0.5, 5).half_life().unwrap();
        assert_relative_eq!(half_life, 1.0);
        assert!(CarryoverParams::delayed(0.5, 1.0, 5).half_life().is_none());
    }
}
