//! Polars views of datasets and posteriors.

use adsim_design::CleanDataset;
use adsim_inference::Posterior;
use polars::prelude::*;

use crate::{Result, control_column};

/// Conversion into a polars [`DataFrame`].
pub trait ToDataFrame {
    /// Build a DataFrame view of `self`.
    fn to_dataframe(&self) -> Result<DataFrame>;
}

impl ToDataFrame for CleanDataset {
    /// Columns follow the CSV layout; `date` is a polars `Date`.
    fn to_dataframe(&self) -> Result<DataFrame> {
        let rows = self.rows();
        let dates: Vec<String> = rows
            .iter()
            .map(|r| r.date.format("%Y-%m-%d").to_string())
            .collect();

        let mut columns: Vec<Column> = vec![
            Series::new("date".into(), dates).into(),
            Series::new("outcome".into(), self.outcome()).into(),
        ];
        for (c, channel) in self.channels().iter().enumerate() {
            let values: Vec<f64> = rows.iter().map(|r| r.responses[c]).collect();
            columns.push(Series::new(channel.name().into(), values).into());
        }
        for k in 0..self.num_controls() {
            let values: Vec<f64> = rows.iter().map(|r| r.controls[k]).collect();
            columns.push(Series::new(control_column(k).as_str().into(), values).into());
        }
        columns.push(Series::new("noise".into(), self.noise()).into());

        let df = DataFrame::new(columns)?
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;
        Ok(df)
    }
}

impl ToDataFrame for Posterior {
    /// One row per channel estimate.
    fn to_dataframe(&self) -> Result<DataFrame> {
        let estimates = self.channels();
        let channels: Vec<String> = estimates.iter().map(|e| e.channel.to_string()).collect();
        let rates: Vec<f64> = estimates.iter().map(|e| e.rate).collect();
        let thetas: Vec<Option<f64>> = estimates.iter().map(|e| e.theta).collect();
        let ks: Vec<f64> = estimates.iter().map(|e| e.k).collect();
        let slopes: Vec<f64> = estimates.iter().map(|e| e.s).collect();
        let ceilings: Vec<f64> = estimates.iter().map(|e| e.b).collect();
        let fixed: Vec<bool> = estimates.iter().map(|e| e.slope_fixed).collect();

        let df = DataFrame::new(vec![
            Series::new("channel".into(), channels).into(),
            Series::new("rate".into(), rates).into(),
            Series::new("theta".into(), thetas).into(),
            Series::new("k".into(), ks).into(),
            Series::new("s".into(), slopes).into(),
            Series::new("b".into(), ceilings).into(),
            Series::new("slope_fixed".into(), fixed).into(),
        ])?;
        Ok(df)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsim_design::{RunConfig, Scenario};

    #[test]
    fn test_dataset_frame_layout() {
        let run = Scenario::run(&RunConfig::default().with_periods(30).with_window(5)).unwrap();
        let df = run.dataset().to_dataframe().unwrap();
        assert_eq!(df.height(), 26);
        assert_eq!(
            df.get_column_names()
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
            vec!["date", "outcome", "tv", "radio", "online", "control", "noise"]
        );
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
    }
}
