//! Grid Search Engine
//!
//! Deterministic engine that recovers carryover and saturation parameters
//! from a raw payload.
//!
//! 1. Each channel's lag tensor is min-max scaled over all of its cells. The
//!    tensor covers every period of the series, so the bounds equal the ones
//!    the normalizer used.
//! 2. For a channel state (rate, θ, K) the feature is the unit-ceiling
//!    response BHill(1, K, S, carryover(x)) per row, with S held fixed.
//! 3. Given one feature per channel, τ, B_c and γ_k solve the linear model
//!    y = τ + Σ B_c f_c + Σ γ_k z_k by ordinary least squares.
//! 4. Coordinate descent: every sweep grid-searches one channel at a time
//!    with the others held at their current state, keeping the lowest
//!    residual sum of squares. Stops when a sweep changes nothing.
//!
//! S and K are not jointly identifiable from short series; the slope is
//! fixed and reported as such on every estimate.

use adsim_design::ModelPayload;
use adsim_transforms::{CarryoverParams, DecayKind, b_hill, weighted_lag_average};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, ArrayView2, s};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{ChannelEstimate, InferenceEngine, InferenceError, Posterior, Result, validate_payload};

/// Diagonal tolerance below which the normal equations count as singular
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Search grid and iteration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Carryover kernel to search
    pub kernel: DecayKind,
    /// Candidate carryover rates, each in (0, 1)
    pub rates: Vec<f64>,
    /// Candidate delays θ (delayed kernel only)
    pub thetas: Vec<f64>,
    /// Candidate half-saturation points, each > 0
    pub ks: Vec<f64>,
    /// Fixed slope S
    pub slope: f64,
    /// Maximum coordinate-descent sweeps
    pub max_sweeps: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            kernel: DecayKind::Delayed,
            rates: (1..20).map(|i| f64::from(i) / 20.0).collect(),
            thetas: (0..7).map(|i| f64::from(i) / 2.0).collect(),
            ks: (1..20).map(|i| f64::from(i) / 20.0).collect(),
            slope: 1.0,
            max_sweeps: 5,
        }
    }
}

impl GridConfig {
    fn thetas(&self) -> Vec<f64> {
        match self.kernel {
            DecayKind::Geometric => vec![0.0],
            DecayKind::Delayed => self.thetas.clone(),
        }
    }

    fn params(&self, rate: f64, theta: f64, window: usize) -> CarryoverParams {
        match self.kernel {
            DecayKind::Geometric => CarryoverParams::geometric(rate, window),
            DecayKind::Delayed => CarryoverParams::delayed(rate, theta, window),
        }
    }

    /// Validate the grid.
    pub fn validate(&self) -> Result<()> {
        if self.rates.is_empty() || self.ks.is_empty() || self.thetas().is_empty() {
            return Err(InferenceError::Config(
                "rate, theta and K grids must be non-empty".to_string(),
            ));
        }
        if self.rates.iter().any(|&r| r.is_nan() || r <= 0.0 || r >= 1.0) {
            return Err(InferenceError::Config(
                "every candidate rate must lie in (0, 1)".to_string(),
            ));
        }
        if self.thetas().iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(InferenceError::Config(
                "every candidate theta must be finite and >= 0".to_string(),
            ));
        }
        if self.ks.iter().any(|k| !k.is_finite() || *k <= 0.0) {
            return Err(InferenceError::Config(
                "every candidate K must be finite and > 0".to_string(),
            ));
        }
        if !self.slope.is_finite() || self.slope <= 0.0 {
            return Err(InferenceError::Config(format!(
                "slope must be finite and > 0, got {}",
                self.slope
            )));
        }
        if self.max_sweeps == 0 {
            return Err(InferenceError::Config(
                "at least one sweep is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// One point of the search grid
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    rate: f64,
    theta: f64,
    k: f64,
}

/// Candidate features of one channel, one row per candidate
#[derive(Debug)]
struct ChannelGrid {
    candidates: Vec<Candidate>,
    features: Array2<f64>,
}

/// Least-squares solution for one set of channel features
#[derive(Debug, Clone)]
struct Fit {
    beta: Array1<f64>,
    fitted: Array1<f64>,
    rss: f64,
}

/// Deterministic grid-search engine
#[derive(Debug, Clone, Default)]
pub struct GridSearchEngine {
    config: GridConfig,
}

impl GridSearchEngine {
    /// Engine name recorded on posteriors.
    pub const NAME: &'static str = "grid-search";

    /// Create an engine with a custom grid.
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Search grid of this engine.
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    fn channel_grid(&self, lags: ArrayView2<'_, f64>) -> Result<ChannelGrid> {
        let (n, window) = lags.dim();
        let min = lags.iter().copied().fold(f64::INFINITY, f64::min);
        let max = lags.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range.is_nan() || range <= 0.0 {
            return Err(InferenceError::InvalidPayload(
                "a channel's raw exposure is constant".to_string(),
            ));
        }
        let scaled = lags.mapv(|v| (v - min) / range);

        let mut candidates = Vec::new();
        let mut rows = Vec::new();
        for &rate in &self.config.rates {
            for theta in self.config.thetas() {
                let weights = self
                    .config
                    .params(rate, theta, window)
                    .weights()
                    .map_err(|e| InferenceError::Config(e.to_string()))?;
                let adstock = scaled
                    .outer_iter()
                    .map(|row| weighted_lag_average(row, &weights))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| InferenceError::engine_failed(e.to_string()))?;
                for &k in &self.config.ks {
                    let feature = adstock
                        .iter()
                        .map(|&x| b_hill(1.0, k, self.config.slope, x))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|e| InferenceError::engine_failed(e.to_string()))?;
                    candidates.push(Candidate { rate, theta, k });
                    rows.extend(feature);
                }
            }
        }

        let features = Array2::from_shape_vec((candidates.len(), n), rows)
            .map_err(|e| InferenceError::engine_failed(e.to_string()))?;
        Ok(ChannelGrid {
            candidates,
            features,
        })
    }

    /// Best candidate for channel `c` with the other channels held at `state`.
    fn search_channel(
        grids: &[ChannelGrid],
        state: &[usize],
        c: usize,
        controls: ArrayView2<'_, f64>,
        outcome: &Array1<f64>,
    ) -> Option<(usize, Fit)> {
        (0..grids[c].candidates.len())
            .into_par_iter()
            .filter_map(|j| {
                let design = design_matrix(grids, state, Some((c, j)), controls);
                least_squares(&design, outcome).map(|fit| (j, fit))
            })
            .min_by(|(ja, a), (jb, b)| a.rss.total_cmp(&b.rss).then(ja.cmp(jb)))
    }
}

impl InferenceEngine for GridSearchEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn fit(&self, payload: &ModelPayload) -> Result<Posterior> {
        let num_channels = payload.num_channels();
        let num_controls = payload.num_controls();
        validate_payload(payload, 1 + num_channels + num_controls)?;
        warn!(
            slope = self.config.slope,
            "slope S held fixed; S and K are not jointly identifiable"
        );

        let tensor = payload.raw_tensor();
        let grids = (0..num_channels)
            .map(|c| self.channel_grid(tensor.slice(s![.., c, ..])))
            .collect::<Result<Vec<_>>>()?;
        let outcome = payload.outcome().to_owned();
        let controls = payload.control_matrix();

        // Start every channel at the middle of its grid.
        let mut state: Vec<usize> = grids.iter().map(|g| g.candidates.len() / 2).collect();
        let mut best = least_squares(&design_matrix(&grids, &state, None, controls), &outcome);

        for sweep in 0..self.config.max_sweeps {
            let mut changed = false;
            for c in 0..num_channels {
                let Some((j, fit)) = Self::search_channel(&grids, &state, c, controls, &outcome)
                else {
                    continue;
                };
                let improves = best.as_ref().is_none_or(|b| fit.rss < b.rss);
                if improves {
                    changed |= state[c] != j;
                    state[c] = j;
                    best = Some(fit);
                }
            }
            debug!(
                sweep,
                rss = best.as_ref().map_or(f64::NAN, |b| b.rss),
                "coordinate descent sweep"
            );
            if !changed {
                break;
            }
        }

        let fit = best.ok_or_else(|| {
            InferenceError::engine_failed("no candidate gave a solvable least-squares system")
        })?;

        let estimates = payload
            .channels()
            .iter()
            .zip(&state)
            .enumerate()
            .map(|(c, (&channel, &j))| {
                let candidate = grids[c].candidates[j];
                ChannelEstimate {
                    channel,
                    rate: candidate.rate,
                    theta: match self.config.kernel {
                        DecayKind::Geometric => None,
                        DecayKind::Delayed => Some(candidate.theta),
                    },
                    k: candidate.k,
                    s: self.config.slope,
                    b: fit.beta[1 + c],
                    slope_fixed: true,
                }
            })
            .collect();
        let gamma = fit.beta.slice(s![1 + num_channels..]).to_vec();

        info!(
            rows = payload.n(),
            channels = num_channels,
            rss = fit.rss,
            "grid search complete"
        );
        Posterior::new(
            Self::NAME,
            estimates,
            fit.beta[0],
            gamma,
            fit.fitted.to_vec(),
            payload,
        )
    }
}

/// Columns: intercept, one feature per channel, then the controls.
fn design_matrix(
    grids: &[ChannelGrid],
    state: &[usize],
    replace: Option<(usize, usize)>,
    controls: ArrayView2<'_, f64>,
) -> Array2<f64> {
    let n = controls.nrows();
    let mut x = Array2::ones((n, 1 + grids.len() + controls.ncols()));
    for (c, grid) in grids.iter().enumerate() {
        let j = match replace {
            Some((rc, rj)) if rc == c => rj,
            _ => state[c],
        };
        x.column_mut(1 + c).assign(&grid.features.row(j));
    }
    x.slice_mut(s![.., 1 + grids.len()..]).assign(&controls);
    x
}

/// Ordinary least squares through the normal equations.
///
/// Returns `None` when XᵀX is not positive definite.
fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Option<Fit> {
    let xtx = x.t().dot(x);
    let xty = x.t().dot(y);
    let beta = cholesky_solve(&xtx, &xty)?;
    let fitted = x.dot(&beta);
    let rss = (y - &fitted).mapv(|r| r * r).sum();
    rss.is_finite().then_some(Fit { beta, fitted, rss })
}

/// Solve A z = b for symmetric positive definite A.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let p = a.nrows();
    let scale = a.diag().iter().copied().fold(0.0, f64::max).max(1.0);
    let mut lower = Array2::<f64>::zeros((p, p));
    for i in 0..p {
        for j in 0..=i {
            let dot: f64 = (0..j).map(|m| lower[[i, m]] * lower[[j, m]]).sum();
            if i == j {
                let pivot = a[[i, i]] - dot;
                if pivot <= PIVOT_TOLERANCE * scale {
                    return None;
                }
                lower[[i, i]] = pivot.sqrt();
            } else {
                lower[[i, j]] = (a[[i, j]] - dot) / lower[[j, j]];
            }
        }
    }

    // Forward then back substitution.
    let mut z = Array1::<f64>::zeros(p);
    for i in 0..p {
        let dot: f64 = (0..i).map(|m| lower[[i, m]] * z[m]).sum();
        z[i] = (b[i] - dot) / lower[[i, i]];
    }
    let mut out = Array1::<f64>::zeros(p);
    for i in (0..p).rev() {
        let dot: f64 = (i + 1..p).map(|m| lower[[m, i]] * out[m]).sum();
        out[i] = (z[i] - dot) / lower[[i, i]];
    }
    Some(out)
}
