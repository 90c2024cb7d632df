//! Inference payload
//!
//! The fixed-shape numeric record handed to an inference engine:
//!
//! | field            | shape                          |
//! |------------------|--------------------------------|
//! | `N`              | scalar, complete rows          |
//! | `outcome`        | [N]                            |
//! | `max_lag`        | scalar L                       |
//! | `num_channels`   | scalar C                       |
//! | `lag_indices`    | [L] = 0..L-1                   |
//! | `raw_tensor`     | [N][C][L], lag 0 = current     |
//! | `num_controls`   | scalar K                       |
//! | `control_matrix` | [N][K]                         |
//!
//! `outcome[i]`, `raw_tensor[i]` and `control_matrix[i]` always describe the
//! same period. A payload is validated on construction and immutable after.

use std::collections::HashSet;

use adsim_series::{Channel, TimeSeries};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, s};
use serde::{Deserialize, Serialize};

use crate::{DesignError, Result};

/// Raw, untransformed exposure history of one channel.
///
/// The payload tensor is only ever filled from values of this type, which
/// wraps a series straight out of the generator (or supplied by a caller as
/// raw data), never a normalized or transformed one.
#[derive(Debug, Clone, PartialEq)]
pub struct RawExposure {
    channel: Channel,
    series: TimeSeries,
}

impl RawExposure {
    /// Wrap a raw series.
    pub const fn new(channel: Channel, series: TimeSeries) -> Self {
        Self { channel, series }
    }

    /// Channel of this exposure.
    pub const fn channel(&self) -> Channel {
        self.channel
    }

    /// Underlying raw series.
    pub const fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Lag-ordered window ending at `t`: element l is the value at `t - l`.
    pub fn lags(&self, t: usize, window: usize) -> Option<Vec<f64>> {
        self.series
            .trailing_window(t, window)
            .map(|w| w.iter().rev().copied().collect())
    }
}

/// Numeric payload for an inference engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PayloadRecord", try_from = "PayloadRecord")]
pub struct ModelPayload {
    channels: Vec<Channel>,
    outcome: Array1<f64>,
    raw_tensor: Array3<f64>,
    control_matrix: Array2<f64>,
}

impl ModelPayload {
    /// Build a payload, validating every dimension.
    pub fn new(
        channels: Vec<Channel>,
        outcome: Array1<f64>,
        raw_tensor: Array3<f64>,
        control_matrix: Array2<f64>,
    ) -> Result<Self> {
        let (n, c, l) = raw_tensor.dim();
        if l == 0 {
            return Err(DesignError::Config(
                "Payload lag dimension must be >= 1".to_string(),
            ));
        }
        if c == 0 || channels.len() != c {
            return Err(DesignError::shape("payload channels", c, channels.len()));
        }
        let mut seen = HashSet::with_capacity(c);
        if let Some(dup) = channels.iter().find(|ch| !seen.insert(**ch)) {
            return Err(DesignError::Config(format!("Duplicate channel: {dup}")));
        }
        if outcome.len() != n {
            return Err(DesignError::shape("payload outcome", n, outcome.len()));
        }
        if control_matrix.nrows() != n {
            return Err(DesignError::shape(
                "payload control rows",
                n,
                control_matrix.nrows(),
            ));
        }
        let finite = outcome
            .iter()
            .chain(raw_tensor.iter())
            .chain(control_matrix.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(DesignError::Config(
                "Payload contains non-finite values".to_string(),
            ));
        }
        Ok(Self {
            channels,
            outcome,
            raw_tensor,
            control_matrix,
        })
    }

    /// Number of complete rows N.
    pub fn n(&self) -> usize {
        self.outcome.len()
    }

    /// Whether the payload has no rows.
    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    /// Maximum lag L (window length).
    pub fn max_lag(&self) -> usize {
        self.raw_tensor.dim().2
    }

    /// Number of channels C.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Number of control series K.
    pub fn num_controls(&self) -> usize {
        self.control_matrix.ncols()
    }

    /// Lag indices 0..L-1.
    pub fn lag_indices(&self) -> Vec<usize> {
        (0..self.max_lag()).collect()
    }

    /// Channels in tensor order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Outcome vector.
    pub fn outcome(&self) -> ArrayView1<'_, f64> {
        self.outcome.view()
    }

    /// Raw lag tensor [N][C][L].
    pub fn raw_tensor(&self) -> ArrayView3<'_, f64> {
        self.raw_tensor.view()
    }

    /// Lag vector of channel index `c` at row `i`.
    pub fn lags(&self, i: usize, c: usize) -> ArrayView1<'_, f64> {
        self.raw_tensor.slice(s![i, c, ..])
    }

    /// Control matrix [N][K].
    pub fn control_matrix(&self) -> ArrayView2<'_, f64> {
        self.control_matrix.view()
    }

    /// Check every tensor cell against the raw series it should come from.
    ///
    /// `periods[i]` is the period row `i` ends at. Fails with
    /// [`DesignError::NotRaw`] on the first cell that differs.
    pub fn verify_raw_source(&self, raw: &[&RawExposure], periods: &[usize]) -> Result<()> {
        if raw.len() != self.num_channels() {
            return Err(DesignError::shape("raw exposures", self.num_channels(), raw.len()));
        }
        if periods.len() != self.n() {
            return Err(DesignError::shape("row periods", self.n(), periods.len()));
        }
        for (c, exposure) in raw.iter().enumerate() {
            if exposure.channel() != self.channels[c] {
                return Err(DesignError::NotRaw(format!(
                    "tensor channel {c} is {}, raw exposure is {}",
                    self.channels[c],
                    exposure.channel()
                )));
            }
            for (i, &t) in periods.iter().enumerate() {
                for l in 0..self.max_lag() {
                    let expected = t.checked_sub(l).and_then(|p| exposure.series().value(p));
                    let actual = self.raw_tensor[[i, c, l]];
                    if expected.map(f64::to_bits) != Some(actual.to_bits()) {
                        return Err(DesignError::NotRaw(format!(
                            "{} row {i} lag {l}: tensor holds {actual}, raw series holds {expected:?}",
                            self.channels[c]
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Wire form of [`ModelPayload`] with nested arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PayloadRecord {
    #[serde(rename = "N")]
    n: usize,
    outcome: Vec<f64>,
    max_lag: usize,
    num_channels: usize,
    lag_indices: Vec<usize>,
    raw_tensor: Vec<Vec<Vec<f64>>>,
    num_controls: usize,
    control_matrix: Vec<Vec<f64>>,
    /// Absent in minimal payloads; channels then follow [`Channel::ALL`] order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channels: Option<Vec<Channel>>,
}

impl From<ModelPayload> for PayloadRecord {
    fn from(payload: ModelPayload) -> Self {
        Self {
            n: payload.n(),
            max_lag: payload.max_lag(),
            num_channels: payload.num_channels(),
            lag_indices: payload.lag_indices(),
            num_controls: payload.num_controls(),
            raw_tensor: payload
                .raw_tensor
                .outer_iter()
                .map(|row| row.outer_iter().map(|lags| lags.to_vec()).collect())
                .collect(),
            control_matrix: payload
                .control_matrix
                .outer_iter()
                .map(|row| row.to_vec())
                .collect(),
            outcome: payload.outcome.to_vec(),
            channels: Some(payload.channels),
        }
    }
}

impl TryFrom<PayloadRecord> for ModelPayload {
    type Error = DesignError;

    fn try_from(record: PayloadRecord) -> Result<Self> {
        let PayloadRecord {
            n,
            outcome,
            max_lag,
            num_channels,
            lag_indices,
            raw_tensor,
            num_controls,
            control_matrix,
            channels,
        } = record;

        let channels = channels.map_or_else(|| default_channels(num_channels), Ok)?;

        if lag_indices != (0..max_lag).collect::<Vec<_>>() {
            return Err(DesignError::Config(format!(
                "lag_indices must be 0..{max_lag}, got {lag_indices:?}"
            )));
        }
        if outcome.len() != n || raw_tensor.len() != n || control_matrix.len() != n {
            return Err(DesignError::shape("payload rows", n, outcome.len()));
        }

        let mut flat = Vec::with_capacity(n * num_channels * max_lag);
        for row in raw_tensor {
            if row.len() != num_channels {
                return Err(DesignError::shape("tensor channels", num_channels, row.len()));
            }
            for lags in row {
                if lags.len() != max_lag {
                    return Err(DesignError::shape("tensor lags", max_lag, lags.len()));
                }
                flat.extend(lags);
            }
        }
        let mut controls = Vec::with_capacity(n * num_controls);
        for row in control_matrix {
            if row.len() != num_controls {
                return Err(DesignError::shape("control columns", num_controls, row.len()));
            }
            controls.extend(row);
        }

        let tensor = Array3::from_shape_vec((n, num_channels, max_lag), flat)
            .map_err(|e| DesignError::Config(format!("raw tensor: {e}")))?;
        let controls = Array2::from_shape_vec((n, num_controls), controls)
            .map_err(|e| DesignError::Config(format!("control matrix: {e}")))?;
        Self::new(channels, Array1::from_vec(outcome), tensor, controls)
    }
}

/// First `count` channels of [`Channel::ALL`], for payloads without names.
fn default_channels(count: usize) -> Result<Vec<Channel>> {
    Channel::ALL
        .get(..count)
        .map(<[Channel]>::to_vec)
        .ok_or_else(|| {
            DesignError::Config(format!(
                "Unnamed payload channels: at most {} supported, got {count}",
                Channel::ALL.len()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use adsim_series::Calendar;

    fn small_payload() -> ModelPayload {
        let tensor =
            Array3::from_shape_vec((2, 1, 3), vec![3.0, 2.0, 1.0, 4.0, 3.0, 2.0]).unwrap();
        let controls = Array2::from_shape_vec((2, 1), vec![0.5, 0.6]).unwrap();
        ModelPayload::new(
            vec![Channel::Tv],
            Array1::from_vec(vec![10.0, 11.0]),
            tensor,
            controls,
        )
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let payload = small_payload();
        assert_eq!(payload.n(), 2);
        assert_eq!(payload.max_lag(), 3);
        assert_eq!(payload.num_channels(), 1);
        assert_eq!(payload.num_controls(), 1);
        assert_eq!(payload.lag_indices(), vec![0, 1, 2]);
        assert_eq!(payload.lags(1, 0).to_vec(), vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_json_uses_contract_field_names() {
        let json = serde_json::to_value(small_payload()).unwrap();
        for key in [
            "N",
            "outcome",
            "max_lag",
            "num_channels",
            "lag_indices",
            "raw_tensor",
            "num_controls",
            "control_matrix",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["raw_tensor"][1][0], serde_json::json!([4.0, 3.0, 2.0]));
        assert_eq!(json["N"], 2);
    }

    #[test]
    fn test_json_round_trip() {
        let payload = small_payload();
        let json = serde_json::to_string(&payload).unwrap();
        let back: ModelPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_ragged_tensor_rejected() {
        let json = r#"{"N":1,"outcome":[1.0],"max_lag":2,"num_channels":1,"lag_indices":[0,1],
            "raw_tensor":[[[1.0]]],"num_controls":0,"control_matrix":[[]],"channels":["tv"]}"#;
        assert!(serde_json::from_str::<ModelPayload>(json).is_err());
    }

    #[test]
    fn test_contract_fields_only() {
        let json = r#"{"N":2,"outcome":[10.0,11.0],"max_lag":3,"num_channels":2,
            "lag_indices":[0,1,2],
            "raw_tensor":[[[3.0,2.0,1.0],[1.0,0.0,0.0]],[[4.0,3.0,2.0],[0.0,1.0,0.0]]],
            "num_controls":1,"control_matrix":[[0.5],[0.6]]}"#;
        let payload: ModelPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.channels(), &[Channel::Tv, Channel::Radio]);
        assert_eq!(payload.n(), 2);
        assert_eq!(payload.lags(1, 0).to_vec(), vec![4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_unnamed_channels_beyond_known_set_rejected() {
        let lags = "[[0.0],[0.0],[0.0],[0.0],[0.0],[0.0]]";
        let json = format!(
            r#"{{"N":1,"outcome":[1.0],"max_lag":1,"num_channels":6,"lag_indices":[0],
            "raw_tensor":[{lags}],"num_controls":0,"control_matrix":[[]]}}"#
        );
        assert!(serde_json::from_str::<ModelPayload>(&json).is_err());
    }

    #[test]
    fn test_duplicate_channels_rejected() {
        let err = ModelPayload::new(
            vec![Channel::Tv, Channel::Tv],
            Array1::zeros(1),
            Array3::zeros((1, 2, 3)),
            Array2::zeros((1, 0)),
        )
        .unwrap_err();
        assert!(err.is_config());

        let json = r#"{"N":1,"outcome":[1.0],"max_lag":1,"num_channels":2,"lag_indices":[0],
            "raw_tensor":[[[1.0],[2.0]]],"num_controls":0,"control_matrix":[[]],
            "channels":["tv","tv"]}"#;
        assert!(serde_json::from_str::<ModelPayload>(json).is_err());
    }

    #[test]
    fn test_outcome_length_mismatch_rejected() {
        let tensor = Array3::zeros((2, 1, 3));
        let controls = Array2::zeros((2, 0));
        let err = ModelPayload::new(
            vec![Channel::Tv],
            Array1::zeros(3),
            tensor,
            controls,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_verify_raw_source() {
        let series = TimeSeries::new(Calendar::default(), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let exposure = RawExposure::new(Channel::Tv, series);
        let raw = [&exposure];
        let payload = small_payload();
        payload.verify_raw_source(&raw, &[2, 3]).unwrap();

        let err = payload.verify_raw_source(&raw, &[3, 3]).unwrap_err();
        assert!(matches!(err, DesignError::NotRaw(_)));
    }

    #[test]
    fn test_raw_exposure_lags() {
        let series = TimeSeries::new(Calendar::default(), vec![1.0, 2.0, 3.0]).unwrap();
        let raw = RawExposure::new(Channel::Radio, series);
        assert_eq!(raw.lags(2, 3), Some(vec![3.0, 2.0, 1.0]));
        assert_eq!(raw.lags(1, 3), None);
    }
}
