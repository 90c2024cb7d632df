//! Dataset CSV persistence.
//!
//! Layout: `date,outcome,<channel>...,control,noise`, one row per retained
//! period. Additional controls are named `control_2`, `control_3`, and so on.
//! Dates are ISO-8601; floats use Rust's shortest round-trip formatting.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use adsim_design::{CleanDataset, DatasetRow};
use adsim_series::Channel;
use chrono::NaiveDate;
use tracing::debug;

use crate::{ExportError, Result};

/// Name of control column `k` (zero-based).
pub fn control_column(k: usize) -> String {
    if k == 0 {
        "control".to_string()
    } else {
        format!("control_{}", k + 1)
    }
}

/// CSV header for `dataset`.
pub fn dataset_header(dataset: &CleanDataset) -> Vec<String> {
    let mut header = vec!["date".to_string(), "outcome".to_string()];
    header.extend(dataset.channels().iter().map(|c| c.name().to_string()));
    header.extend((0..dataset.num_controls()).map(control_column));
    header.push("noise".to_string());
    header
}

/// Write `dataset` as CSV.
pub fn write_dataset_csv<W: Write>(dataset: &CleanDataset, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(dataset_header(dataset))?;
    for row in dataset.rows() {
        let mut record = Vec::with_capacity(3 + row.responses.len() + row.controls.len());
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.push(row.outcome.to_string());
        record.extend(row.responses.iter().map(f64::to_string));
        record.extend(row.controls.iter().map(f64::to_string));
        record.push(row.noise.to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    debug!(rows = dataset.len(), "wrote dataset csv");
    Ok(())
}

/// Render `dataset` as a CSV string.
pub fn dataset_to_csv_string(dataset: &CleanDataset) -> Result<String> {
    let mut buffer = Vec::new();
    write_dataset_csv(dataset, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

/// Write `dataset` to a CSV file.
pub fn save_dataset_csv(dataset: &CleanDataset, path: &Path) -> Result<()> {
    write_dataset_csv(dataset, File::create(path)?)
}

/// Column layout recovered from a header
#[derive(Debug)]
struct Layout {
    channels: Vec<Channel>,
    num_controls: usize,
}

fn parse_header(header: &csv::StringRecord) -> Result<Layout> {
    let columns: Vec<&str> = header.iter().collect();
    if columns.len() < 4 {
        return Err(ExportError::InvalidFormat(format!(
            "expected at least date, outcome, one channel and noise, got {columns:?}"
        )));
    }
    if columns[0] != "date" || columns[1] != "outcome" {
        return Err(ExportError::InvalidFormat(format!(
            "header must start with date,outcome, got {},{}",
            columns[0], columns[1]
        )));
    }
    if columns[columns.len() - 1] != "noise" {
        return Err(ExportError::InvalidFormat("header must end with noise".to_string()));
    }

    let middle = &columns[2..columns.len() - 1];
    let split = middle
        .iter()
        .position(|c| c.starts_with("control"))
        .unwrap_or(middle.len());
    let (channel_cols, control_cols) = middle.split_at(split);

    let mut channels = Vec::with_capacity(channel_cols.len());
    for name in channel_cols {
        let channel: Channel = name
            .parse()
            .map_err(|_| ExportError::InvalidFormat(format!("unknown channel column {name:?}")))?;
        if channels.contains(&channel) {
            return Err(ExportError::InvalidFormat(format!("duplicate channel column {name:?}")));
        }
        channels.push(channel);
    }
    if channels.is_empty() {
        return Err(ExportError::InvalidFormat("no channel columns".to_string()));
    }
    for (k, name) in control_cols.iter().enumerate() {
        if *name != control_column(k) {
            return Err(ExportError::InvalidFormat(format!(
                "expected column {:?}, got {name:?}",
                control_column(k)
            )));
        }
    }

    Ok(Layout {
        channels,
        num_controls: control_cols.len(),
    })
}

fn parse_value(field: &str, column: &str, line: usize) -> Result<f64> {
    field.parse().map_err(|_| {
        ExportError::InvalidFormat(format!("line {line}, column {column}: not a number: {field:?}"))
    })
}

/// Read a dataset written by [`write_dataset_csv`].
///
/// The header shape is validated before any row is read.
pub fn read_dataset_csv<R: Read>(reader: R) -> Result<CleanDataset> {
    let mut rdr = csv::Reader::from_reader(reader);
    let header = rdr.headers()?.clone();
    let layout = parse_header(&header)?;
    let num_channels = layout.channels.len();

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 2;
        if record.len() != header.len() {
            return Err(ExportError::InvalidFormat(format!(
                "line {line}: {} fields, header has {}",
                record.len(),
                header.len()
            )));
        }
        let value = |j: usize| parse_value(&record[j], &header[j], line);

        let date = NaiveDate::parse_from_str(&record[0], "%Y-%m-%d").map_err(|e| {
            ExportError::InvalidFormat(format!("line {line}: bad date {:?}: {e}", &record[0]))
        })?;
        let outcome = value(1)?;
        let responses = (2..2 + num_channels).map(value).collect::<Result<Vec<_>>>()?;
        let controls = (2 + num_channels..2 + num_channels + layout.num_controls)
            .map(value)
            .collect::<Result<Vec<_>>>()?;
        let noise = value(record.len() - 1)?;

        rows.push(DatasetRow {
            date,
            outcome,
            responses,
            controls,
            noise,
        });
    }

    debug!(rows = rows.len(), channels = num_channels, "read dataset csv");
    Ok(CleanDataset::new(layout.channels, layout.num_controls, rows)?)
}

/// Read a dataset CSV file.
pub fn load_dataset_csv(path: &Path) -> Result<CleanDataset> {
    read_dataset_csv(File::open(path)?)
}
