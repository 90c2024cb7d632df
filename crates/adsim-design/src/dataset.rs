//! Design rows and the ground-truth dataset.

use adsim_series::Channel;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{DesignError, Result};

/// One complete period of the design (t >= L - 1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRow {
    /// Period index t
    pub period: usize,
    /// Date of period t
    pub date: NaiveDate,
    /// Raw lag window per channel; element l is the raw value at t - l
    pub raw_lags: Vec<Vec<f64>>,
    /// Transformed response per channel
    pub responses: Vec<f64>,
    /// Control values
    pub controls: Vec<f64>,
    /// Noise draw
    pub noise: f64,
    /// Outcome value
    pub outcome: f64,
}

/// One persisted row of the clean dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    /// Date of the period
    pub date: NaiveDate,
    /// Outcome value
    pub outcome: f64,
    /// Response per channel, in dataset channel order
    pub responses: Vec<f64>,
    /// Control values
    pub controls: Vec<f64>,
    /// Noise draw
    pub noise: f64,
}

impl From<&DesignRow> for DatasetRow {
    fn from(row: &DesignRow) -> Self {
        Self {
            date: row.date,
            outcome: row.outcome,
            responses: row.responses.clone(),
            controls: row.controls.clone(),
            noise: row.noise,
        }
    }
}

/// Ground-truth dataset: date, outcome, per-channel response, controls, noise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanDataset {
    channels: Vec<Channel>,
    num_controls: usize,
    rows: Vec<DatasetRow>,
}

impl CleanDataset {
    /// Build a dataset, checking that every row has one response per
    /// channel and `num_controls` control values.
    pub fn new(channels: Vec<Channel>, num_controls: usize, rows: Vec<DatasetRow>) -> Result<Self> {
        for row in &rows {
            if row.responses.len() != channels.len() {
                return Err(DesignError::shape(
                    format!("responses on {}", row.date),
                    channels.len(),
                    row.responses.len(),
                ));
            }
            if row.controls.len() != num_controls {
                return Err(DesignError::shape(
                    format!("controls on {}", row.date),
                    num_controls,
                    row.controls.len(),
                ));
            }
        }
        Ok(Self {
            channels,
            num_controls,
            rows,
        })
    }

    /// Build a dataset from design rows.
    pub fn from_design_rows(
        channels: Vec<Channel>,
        num_controls: usize,
        rows: &[DesignRow],
    ) -> Result<Self> {
        Self::new(channels, num_controls, rows.iter().map(DatasetRow::from).collect())
    }

    /// Channels in column order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Number of control columns.
    pub const fn num_controls(&self) -> usize {
        self.num_controls
    }

    /// Rows in period order.
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no period was retained.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Outcome column.
    pub fn outcome(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.outcome).collect()
    }

    /// Response column of `channel`.
    pub fn response(&self, channel: Channel) -> Option<Vec<f64>> {
        let idx = self.channels.iter().position(|&c| c == channel)?;
        Some(self.rows.iter().map(|r| r.responses[idx]).collect())
    }

    /// Control column `k`.
    pub fn control(&self, k: usize) -> Option<Vec<f64>> {
        (k < self.num_controls).then(|| self.rows.iter().map(|r| r.controls[k]).collect())
    }

    /// Noise column.
    pub fn noise(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.noise).collect()
    }
}
