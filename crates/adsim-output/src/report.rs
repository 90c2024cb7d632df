//! Recovery report: true against recovered parameters for one run.

use adsim_design::SimulationRun;
use adsim_inference::Posterior;
use adsim_series::Channel;
use adsim_transforms::DecayKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExportError, ExportFormat, Exporter, Result};

/// True and recovered parameters of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecovery {
    /// Channel
    pub channel: Channel,
    /// True carryover rate
    pub true_rate: f64,
    /// Recovered carryover rate
    pub rate: f64,
    /// True delay θ (delayed kernels only)
    pub true_theta: Option<f64>,
    /// Recovered delay θ
    pub theta: Option<f64>,
    /// True half-saturation K
    pub true_k: f64,
    /// Recovered K
    pub k: f64,
    /// True slope S
    pub true_s: f64,
    /// Recovered S
    pub s: f64,
    /// Whether S was held fixed during the fit
    pub slope_fixed: bool,
    /// True ceiling B
    pub true_b: f64,
    /// Recovered B
    pub b: f64,
}

/// Comparison of a run's ground truth with a posterior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Report generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Engine that produced the posterior
    pub engine: String,
    /// Run seed
    pub seed: u64,
    /// Payload rows
    pub rows: usize,
    /// Per-channel comparison
    pub channels: Vec<ChannelRecovery>,
    /// True intercept τ
    pub true_intercept: f64,
    /// Recovered intercept
    pub intercept: f64,
    /// True control coefficients
    pub true_gamma: Vec<f64>,
    /// Recovered control coefficients
    pub gamma: Vec<f64>,
    /// Residual sum of squares
    pub rss: f64,
    /// Coefficient of determination
    pub r_squared: Option<f64>,
}

impl RecoveryReport {
    /// Compare `posterior` with the truth of `run`.
    pub fn new(run: &SimulationRun, posterior: &Posterior) -> Result<Self> {
        let channels = run
            .truth()
            .into_iter()
            .map(|truth| {
                let estimate = posterior.estimate(truth.channel).ok_or_else(|| {
                    ExportError::InvalidFormat(format!(
                        "posterior has no estimate for {}",
                        truth.channel
                    ))
                })?;
                Ok(ChannelRecovery {
                    channel: truth.channel,
                    true_rate: truth.carryover.rate,
                    rate: estimate.rate,
                    true_theta: match truth.carryover.algorithm {
                        DecayKind::Geometric => None,
                        DecayKind::Delayed => Some(truth.carryover.theta),
                    },
                    theta: estimate.theta,
                    true_k: truth.shape.k,
                    k: estimate.k,
                    true_s: truth.shape.s,
                    s: estimate.s,
                    slope_fixed: estimate.slope_fixed,
                    true_b: truth.shape.b,
                    b: estimate.b,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let composition = run.composition();
        Ok(Self {
            generated_at: Utc::now(),
            engine: posterior.engine().to_string(),
            seed: run.config().generation.seed,
            rows: run.payload().n(),
            channels,
            true_intercept: composition.intercept,
            intercept: posterior.intercept(),
            true_gamma: composition.control_coefficients.clone(),
            gamma: posterior.control_coefficients().to_vec(),
            rss: posterior.rss(),
            r_squared: posterior.r_squared(run.payload()),
        })
    }

    /// Largest absolute error in carryover rate across channels.
    pub fn max_rate_error(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| (c.rate - c.true_rate).abs())
            .fold(0.0, f64::max)
    }

    /// Largest absolute error in K across channels.
    pub fn max_k_error(&self) -> f64 {
        self.channels
            .iter()
            .map(|c| (c.k - c.true_k).abs())
            .fold(0.0, f64::max)
    }

    /// Render as an ASCII table.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nParameter Recovery: {}\n", self.engine));
        output.push_str(&format!("Seed: {}  Rows: {}\n", self.seed, self.rows));
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!(
            "{:<10} {:>16} {:>16} {:>16} {:>16}\n",
            "Channel", "Rate", "Theta", "K", "B"
        ));
        output.push_str(&format!(
            "{:<10} {:>16} {:>16} {:>16} {:>16}\n",
            "", "true / est", "true / est", "true / est", "true / est"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for c in &self.channels {
            let theta = |t: Option<f64>| t.map_or_else(|| "-".to_string(), |t| format!("{t:.2}"));
            output.push_str(&format!(
                "{:<10} {:>16} {:>16} {:>16} {:>16}\n",
                c.channel.name(),
                format!("{:.3} / {:.3}", c.true_rate, c.rate),
                format!("{} / {}", theta(c.true_theta), theta(c.theta)),
                format!("{:.3} / {:.3}", c.true_k, c.k),
                format!("{:.3} / {:.3}", c.true_b, c.b),
            ));
        }

        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "{:<10} {:>16}\n",
            "Intercept",
            format!("{:.3} / {:.3}", self.true_intercept, self.intercept)
        ));
        for (k, (t, g)) in self.true_gamma.iter().zip(&self.gamma).enumerate() {
            output.push_str(&format!(
                "{:<10} {:>16}\n",
                format!("Gamma {}", k + 1),
                format!("{t:.3} / {g:.3}")
            ));
        }
        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!("RSS: {:.6e}\n", self.rss));
        if let Some(r2) = self.r_squared {
            output.push_str(&format!("R-squared: {r2:.4}\n"));
        }
        if self.channels.iter().any(|c| c.slope_fixed) {
            output.push_str("Note: slope S held fixed during the fit\n");
        }

        output
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Exporter for RecoveryReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for channel in &self.channels {
                    wtr.serialize(channel)?;
                }
                String::from_utf8(wtr.into_inner()?)
                    .map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => self.to_json(),
        }
    }
}
