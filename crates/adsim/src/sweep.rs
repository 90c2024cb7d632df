//! Scenario sweeps
//!
//! Runs one configuration over many seeds. Runs are independent and execute
//! in parallel; results come back in seed order.

use adsim_design::{DesignError, RunConfig, Scenario, SimulationRun};
use adsim_inference::{InferenceEngine, InferenceError};
use adsim_output::{ExportError, RecoveryReport};
use ndarray::parallel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors of a single sweep run.
#[derive(Debug, Error)]
pub enum SweepError {
    /// Simulation failed
    #[error("Simulation failed: {0}")]
    Design(#[from] DesignError),

    /// Fit failed
    #[error("Fit failed: {0}")]
    Inference(#[from] InferenceError),

    /// Report could not be built
    #[error("Report failed: {0}")]
    Report(#[from] ExportError),
}

/// `count` consecutive seeds starting at `start`.
pub fn seeds_from(start: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| start.wrapping_add(i)).collect()
}

/// Simulate `base` once per seed.
pub fn run_sweep(
    base: &RunConfig,
    seeds: &[u64],
) -> Vec<(u64, Result<SimulationRun, DesignError>)> {
    seeds
        .par_iter()
        .map(|&seed| (seed, Scenario::run(&base.clone().with_seed(seed))))
        .collect()
}

/// Outcome of simulating and fitting one seed
#[derive(Debug)]
pub struct SweepRecord {
    /// Seed of the run
    pub seed: u64,
    /// Recovery report, or why there is none
    pub result: Result<RecoveryReport, SweepError>,
}

/// Simulate `base` once per seed, fit each payload with `engine`, and report
/// recovery.
pub fn sweep_recovery<E>(base: &RunConfig, seeds: &[u64], engine: &E) -> Vec<SweepRecord>
where
    E: InferenceEngine + ?Sized,
{
    let records: Vec<SweepRecord> = seeds
        .par_iter()
        .map(|&seed| SweepRecord {
            seed,
            result: recover_seed(base, seed, engine),
        })
        .collect();

    let summary = SweepSummary::from_records(&records);
    info!(
        runs = summary.runs,
        failures = summary.failures,
        mean_rate_error = summary.mean_rate_error,
        mean_k_error = summary.mean_k_error,
        "sweep complete"
    );
    records
}

fn recover_seed<E>(base: &RunConfig, seed: u64, engine: &E) -> Result<RecoveryReport, SweepError>
where
    E: InferenceEngine + ?Sized,
{
    let run = Scenario::run(&base.clone().with_seed(seed))?;
    let posterior = engine.fit(run.payload())?;
    Ok(RecoveryReport::new(&run, &posterior)?)
}

/// Aggregate recovery accuracy over a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Number of seeds
    pub runs: usize,
    /// Seeds without a report
    pub failures: usize,
    /// Mean over reports of the largest rate error
    pub mean_rate_error: f64,
    /// Largest rate error in any report
    pub max_rate_error: f64,
    /// Mean over reports of the largest K error
    pub mean_k_error: f64,
    /// Largest K error in any report
    pub max_k_error: f64,
}

impl SweepSummary {
    /// Summarize `records`. Error fields are NaN when no run succeeded.
    pub fn from_records(records: &[SweepRecord]) -> Self {
        let reports: Vec<&RecoveryReport> =
            records.iter().filter_map(|r| r.result.as_ref().ok()).collect();
        let rate: Vec<f64> = reports.iter().map(|r| r.max_rate_error()).collect();
        let k: Vec<f64> = reports.iter().map(|r| r.max_k_error()).collect();
        Self {
            runs: records.len(),
            failures: records.len() - reports.len(),
            mean_rate_error: mean(&rate),
            max_rate_error: max(&rate),
            mean_k_error: mean(&k),
            max_k_error: max(&k),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        f64::NAN
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(f64::NAN)
}
