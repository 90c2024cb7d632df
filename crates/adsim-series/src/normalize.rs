//! Min-max normalization over an entire series.
//!
//! Bounds are taken from the full series, never per window, so every
//! downstream windowed transform sees the same scale.

use serde::{Deserialize, Serialize};

use crate::{Result, SeriesError, TimeSeries};

/// Bounds used to rescale a series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMax {
    /// Smallest value of the source series
    pub min: f64,
    /// Largest value of the source series
    pub max: f64,
}

impl MinMax {
    /// Width of the interval.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Map a normalized value back onto the source scale.
    pub fn denormalize(&self, unit: f64) -> f64 {
        self.min + unit * self.range()
    }
}

/// Rescale `series` into [0, 1] and return the bounds that were used.
///
/// # Errors
/// [`SeriesError::Domain`] for an empty series, a non-finite value, or a
/// constant series (max == min).
pub fn normalize_with_bounds(series: &TimeSeries) -> Result<(TimeSeries, MinMax)> {
    if series.values().iter().any(|v| !v.is_finite()) {
        return Err(SeriesError::Domain(
            "Cannot normalize a series containing non-finite values".to_string(),
        ));
    }
    let (Some(min), Some(max)) = (series.min(), series.max()) else {
        return Err(SeriesError::Domain(
            "Cannot normalize an empty series".to_string(),
        ));
    };
    if max == min {
        return Err(SeriesError::Domain(format!(
            "Cannot normalize a constant series (every value is {min})"
        )));
    }

    let bounds = MinMax { min, max };
    let range = bounds.range();
    Ok((series.map_values(|v| (v - min) / range), bounds))
}

/// Rescale `series` into [0, 1] using its global min and max.
pub fn normalize(series: &TimeSeries) -> Result<TimeSeries> {
    normalize_with_bounds(series).map(|(normalized, _)| normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calendar;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn series(values: Vec<f64>) -> TimeSeries {
        TimeSeries::new(Calendar::default(), values).unwrap()
    }

    #[test]
    fn test_normalize_hits_exact_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let len = rng.gen_range(2..40);
            let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-1e3..1e3)).collect();
            let s = series(values);
            if s.min() == s.max() {
                continue;
            }
            let normalized = normalize(&s).unwrap();
            assert_eq!(normalized.min(), Some(0.0));
            assert_eq!(normalized.max(), Some(1.0));
        }
    }

    #[test]
    fn test_normalize_two_values() {
        let normalized = normalize(&series(vec![3.0, -1.0, 1.0])).unwrap();
        assert_eq!(normalized.values(), &[1.0, 0.0, 0.5]);
    }

    #[test]
    fn test_constant_series_is_domain_error() {
        let err = normalize(&series(vec![2.0; 8])).unwrap_err();
        assert!(err.is_domain());
    }

    #[test]
    fn test_empty_and_nan_are_domain_errors() {
        assert!(normalize(&series(vec![])).unwrap_err().is_domain());
        assert!(
            normalize(&series(vec![1.0, f64::NAN]))
                .unwrap_err()
                .is_domain()
        );
    }

    #[test]
    fn test_bounds_denormalize() {
        let source = series(vec![10.0, 20.0, 15.0]);
        let (normalized, bounds) = normalize_with_bounds(&source).unwrap();
        for (&unit, &raw) in normalized.values().iter().zip(source.values()) {
            assert_relative_eq!(bounds.denormalize(unit), raw);
        }
    }
}
