//! Export of datasets, payloads and posteriors.
//!
//! Every exportable type renders to CSV, compact JSON or pretty JSON through
//! the [`Exporter`] trait. Payloads are JSON-only: their lag tensor has no
//! tabular form.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use adsim_design::{CleanDataset, ModelPayload};
use adsim_inference::Posterior;
use serde::{Deserialize, Serialize};

use crate::{ExportError, Result, dataset_to_csv_string};

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::PrettyJson),
            _ => None,
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the format is unsupported.
    fn export_to_string(&self, format: ExportFormat) -> Result<String>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<()> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn to_json<T: Serialize>(value: &T, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(value)?),
        _ => Ok(serde_json::to_string(value)?),
    }
}

impl Exporter for CleanDataset {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => dataset_to_csv_string(self),
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}

impl Exporter for ModelPayload {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => Err(ExportError::InvalidFormat(
                "a payload has no CSV form; export it as JSON".to_string(),
            )),
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}

/// One channel of a posterior, flattened for CSV.
#[derive(Debug, Serialize, Deserialize)]
struct EstimateRecord {
    channel: String,
    rate: f64,
    theta: Option<f64>,
    k: f64,
    s: f64,
    b: f64,
    slope_fixed: bool,
}

impl Exporter for Posterior {
    fn export_to_string(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for estimate in self.channels() {
                    wtr.serialize(EstimateRecord {
                        channel: estimate.channel.to_string(),
                        rate: estimate.rate,
                        theta: estimate.theta,
                        k: estimate.k,
                        s: estimate.s,
                        b: estimate.b,
                        slope_fixed: estimate.slope_fixed,
                    })?;
                }
                String::from_utf8(wtr.into_inner()?)
                    .map_err(|e| ExportError::InvalidFormat(e.to_string()))
            }
            ExportFormat::Json | ExportFormat::PrettyJson => to_json(self, format),
        }
    }
}
