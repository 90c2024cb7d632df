//! Design Assembler
//!
//! Builds the ground truth and the inference payload of one run.
//!
//! Ground truth, per channel and period t >= L - 1:
//! response_c[t] = BHill(carryover(normalize(raw_c))[t])
//! outcome[t] = τ + Σ_c response_c[t] + Σ_k γ_k · control_k[t] + noise[t]
//!
//! The payload is filled from the raw series only: `raw_tensor[i][c][l]` is
//! the untransformed value of channel c at period t_i - l. Periods before
//! L - 1 have no complete window and are dropped.

use std::collections::HashSet;

use adsim_series::{Calendar, Channel, TimeSeries, normalize};
use adsim_transforms::{CarryoverParams, ShapeParams, TransformError, carryover, saturate};
use ndarray::parallel::prelude::*;
use ndarray::{Array1, Array2, Array3};
use tracing::{debug, info};

use crate::{CleanDataset, DesignError, DesignRow, ModelPayload, RawExposure, Result};

/// One channel's raw exposure and ground-truth transform parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInput {
    /// Raw exposure history
    pub raw: RawExposure,
    /// Carryover parameters
    pub carryover: CarryoverParams,
    /// Saturation parameters
    pub shape: ShapeParams,
}

impl ChannelInput {
    /// Channel of this input.
    pub const fn channel(&self) -> Channel {
        self.raw.channel()
    }
}

/// Everything the assembler consumes
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyInput {
    /// Per-channel inputs; all series share one calendar and length
    pub channels: Vec<ChannelInput>,
    /// Control series
    pub controls: Vec<TimeSeries>,
    /// γ_k per control series
    pub control_coefficients: Vec<f64>,
    /// Intercept τ
    pub intercept: f64,
    /// Noise draw per period
    pub noise: TimeSeries,
}

/// Assembled design of one run
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    window: usize,
    rows: Vec<DesignRow>,
    dataset: CleanDataset,
    payload: ModelPayload,
}

impl Design {
    /// Shared window length L.
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Complete design rows.
    pub fn rows(&self) -> &[DesignRow] {
        &self.rows
    }

    /// Ground-truth dataset.
    pub const fn dataset(&self) -> &CleanDataset {
        &self.dataset
    }

    /// Inference payload.
    pub const fn payload(&self) -> &ModelPayload {
        &self.payload
    }

    /// Periods of the retained rows.
    pub fn periods(&self) -> Vec<usize> {
        self.rows.iter().map(|r| r.period).collect()
    }

    /// Split into dataset and payload.
    pub fn into_parts(self) -> (CleanDataset, ModelPayload) {
        (self.dataset, self.payload)
    }
}

struct Shape {
    periods: usize,
    window: usize,
    calendar: Calendar,
}

fn validate(input: &AssemblyInput) -> Result<Shape> {
    let first = input
        .channels
        .first()
        .ok_or_else(|| DesignError::Config("At least one channel is required".to_string()))?;
    let periods = first.raw.series().len();
    let calendar = first.raw.series().calendar();
    let window = first.carryover.window;

    let mut seen = HashSet::new();
    for ci in &input.channels {
        if !seen.insert(ci.channel()) {
            return Err(DesignError::Config(format!(
                "Duplicate channel: {}",
                ci.channel()
            )));
        }
        ci.carryover.validate()?;
        ci.shape.validate()?;
        if ci.carryover.window != window {
            return Err(DesignError::Config(format!(
                "Window length must be shared across channels: {} uses {}, {} uses {window}",
                ci.channel(),
                ci.carryover.window,
                first.channel()
            )));
        }
        check_series(&format!("{} exposure", ci.channel()), ci.raw.series(), periods, calendar)?;
    }

    for (k, control) in input.controls.iter().enumerate() {
        check_series(&format!("control {k}"), control, periods, calendar)?;
    }
    check_series("noise", &input.noise, periods, calendar)?;

    if input.control_coefficients.len() != input.controls.len() {
        return Err(DesignError::shape(
            "control coefficients",
            input.controls.len(),
            input.control_coefficients.len(),
        ));
    }
    if !input.intercept.is_finite() || input.control_coefficients.iter().any(|g| !g.is_finite()) {
        return Err(DesignError::Config(
            "Intercept and control coefficients must be finite".to_string(),
        ));
    }

    Ok(Shape {
        periods,
        window,
        calendar,
    })
}

fn check_series(what: &str, series: &TimeSeries, periods: usize, calendar: Calendar) -> Result<()> {
    if series.len() != periods {
        return Err(DesignError::shape(
            format!("{what} length"),
            periods,
            series.len(),
        ));
    }
    if series.calendar() != calendar {
        return Err(DesignError::Config(format!(
            "{what} is on a different calendar"
        )));
    }
    Ok(())
}

/// Ground-truth response of one channel for periods L-1..n.
fn channel_response(input: &ChannelInput) -> Result<Vec<f64>> {
    let normalized = normalize(input.raw.series())?;
    let adstocked: Vec<f64> = carryover(normalized.values(), &input.carryover)?
        .into_iter()
        .map(|w| w.value)
        .collect();
    let response = saturate(&adstocked, &input.shape)?;
    debug!(
        channel = %input.channel(),
        periods = response.len(),
        "computed channel response"
    );
    Ok(response)
}

fn build_payload(
    channels: &[Channel],
    window: usize,
    num_controls: usize,
    rows: &[DesignRow],
) -> Result<ModelPayload> {
    let mut tensor = Array3::zeros((rows.len(), channels.len(), window));
    let mut controls = Array2::zeros((rows.len(), num_controls));
    for (i, row) in rows.iter().enumerate() {
        for (c, lags) in row.raw_lags.iter().enumerate() {
            for (l, &value) in lags.iter().enumerate() {
                tensor[[i, c, l]] = value;
            }
        }
        for (k, &value) in row.controls.iter().enumerate() {
            controls[[i, k]] = value;
        }
    }
    let outcome: Array1<f64> = rows.iter().map(|r| r.outcome).collect();
    ModelPayload::new(channels.to_vec(), outcome, tensor, controls)
}

/// Assemble the ground-truth dataset and the raw inference payload.
///
/// Shapes and parameters are validated before any transform runs. When the
/// series is shorter than the window no row is retained and both outputs are
/// empty; this is not an error.
pub fn assemble(input: &AssemblyInput) -> Result<Design> {
    let Shape {
        periods,
        window,
        calendar,
    } = validate(input)?;
    let channels: Vec<Channel> = input.channels.iter().map(ChannelInput::channel).collect();
    let first = window - 1;
    let retained = periods.saturating_sub(first);

    let responses: Vec<Vec<f64>> = if retained == 0 {
        vec![Vec::new(); channels.len()]
    } else {
        input
            .channels
            .par_iter()
            .map(channel_response)
            .collect::<Result<Vec<_>>>()?
    };

    let rows = (0..retained)
        .map(|i| {
            let t = first + i;
            let raw_lags = input
                .channels
                .iter()
                .map(|ci| {
                    ci.raw.lags(t, window).ok_or(TransformError::Window {
                        period: t,
                        window,
                        available: periods,
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let row_responses: Vec<f64> = responses.iter().map(|r| r[i]).collect();
            let controls: Vec<f64> = input.controls.iter().map(|s| s.values()[t]).collect();
            let noise = input.noise.values()[t];
            let control_term: f64 = input
                .control_coefficients
                .iter()
                .zip(&controls)
                .map(|(gamma, x)| gamma * x)
                .sum();
            let outcome =
                input.intercept + row_responses.iter().sum::<f64>() + control_term + noise;
            let date = calendar
                .date_at(t)
                .ok_or_else(|| DesignError::Config(format!("No date for period {t}")))?;

            Ok(DesignRow {
                period: t,
                date,
                raw_lags,
                responses: row_responses,
                controls,
                noise,
                outcome,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = build_payload(&channels, window, input.controls.len(), &rows)?;
    if cfg!(debug_assertions) {
        let raw: Vec<&RawExposure> = input.channels.iter().map(|ci| &ci.raw).collect();
        let row_periods: Vec<usize> = rows.iter().map(|r| r.period).collect();
        payload.verify_raw_source(&raw, &row_periods)?;
    }

    let dataset = CleanDataset::from_design_rows(channels, input.controls.len(), &rows)?;

    info!(
        periods,
        window,
        channels = dataset.channels().len(),
        rows = rows.len(),
        dropped = periods - rows.len(),
        "assembled design"
    );

    Ok(Design {
        window,
        rows,
        dataset,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsim_series::Calendar;
    use approx::assert_relative_eq;

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(Calendar::default(), values).unwrap()
    }

    fn input(raw: Vec<f64>, window: usize) -> AssemblyInput {
        let n = raw.len();
        AssemblyInput {
            channels: vec![ChannelInput {
                raw: RawExposure::new(Channel::Tv, series(raw)),
                carryover: CarryoverParams::geometric(0.8, window),
                shape: ShapeParams::new(0.5, 1.0, 1.0),
            }],
            controls: vec![series(vec![1.0; n])],
            control_coefficients: vec![0.0],
            intercept: 0.0,
            noise: series(vec![0.0; n]),
        }
    }

    #[test]
    fn test_rows_and_payload_align() {
        let raw: Vec<f64> = (0..12).map(|t| f64::from(t % 5)).collect();
        let design = assemble(&input(raw, 4)).unwrap();
        let payload = design.payload();
        assert_eq!(payload.n(), 9);
        assert_eq!(design.dataset().len(), 9);
        for (i, row) in design.rows().iter().enumerate() {
            assert_eq!(payload.outcome()[i], row.outcome);
            assert_eq!(payload.lags(i, 0).to_vec(), row.raw_lags[0]);
            assert_eq!(payload.control_matrix()[[i, 0]], 1.0);
        }
    }

    #[test]
    fn test_payload_holds_raw_not_normalized_values() {
        let raw: Vec<f64> = (0..10).map(|t| 100.0 + 10.0 * f64::from(t)).collect();
        let design = assemble(&input(raw, 3)).unwrap();
        // Normalized values would be <= 1.
        assert_eq!(design.payload().lags(0, 0).to_vec(), vec![120.0, 110.0, 100.0]);
    }

    #[test]
    fn test_outcome_composition() {
        let raw: Vec<f64> = (0..8).map(|t| f64::from(t).sin()).collect();
        let mut inp = input(raw, 2);
        inp.intercept = 1.5;
        inp.control_coefficients = vec![-2.0];
        inp.noise = series(vec![0.25; 8]);
        let design = assemble(&inp).unwrap();
        for row in design.rows() {
            assert_relative_eq!(row.outcome, 1.5 + row.responses[0] - 2.0 + 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_short_series_yields_empty_design() {
        let design = assemble(&input(vec![1.0, 2.0, 3.0, 4.0, 5.0], 13)).unwrap();
        assert!(design.dataset().is_empty());
        assert!(design.payload().is_empty());
        assert_eq!(design.payload().max_lag(), 13);
    }

    #[test]
    fn test_constant_exposure_is_domain_error() {
        let err = assemble(&input(vec![2.0; 10], 3)).unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn test_mismatched_windows_rejected() {
        let mut inp = input((0..10).map(f64::from).collect(), 3);
        let mut radio = inp.channels[0].clone();
        radio.raw = RawExposure::new(Channel::Radio, radio.raw.series().clone());
        radio.carryover.window = 4;
        inp.channels.push(radio);
        assert!(assemble(&inp).unwrap_err().is_config());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut inp = input((0..10).map(f64::from).collect(), 3);
        inp.noise = series(vec![0.0; 9]);
        assert!(matches!(
            assemble(&inp).unwrap_err(),
            DesignError::Shape { .. }
        ));
    }
}
