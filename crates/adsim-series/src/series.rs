//! Period-indexed time series
//!
//! A [`TimeSeries`] stores one value per period on a fixed [`Calendar`].
//! Period indices are implicit (position in the value vector), which makes
//! "strictly increasing, no gaps" hold by construction. Series assembled from
//! explicit observations are checked against that invariant.

use chrono::{Days, NaiveDate};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{Result, SeriesError};

/// Spacing between consecutive periods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    /// One period per day
    Daily,
    /// One period per week
    #[default]
    Weekly,
}

impl Frequency {
    /// Number of days between consecutive periods.
    pub const fn days(&self) -> u64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
        }
    }
}

/// Start date and period spacing shared by every series in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Date of period 0
    pub start: NaiveDate,
    /// Period spacing
    pub frequency: Frequency,
}

impl Default for Calendar {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2020, 1, 6).unwrap_or_default(),
            frequency: Frequency::Weekly,
        }
    }
}

impl Calendar {
    /// Create a calendar.
    pub const fn new(start: NaiveDate, frequency: Frequency) -> Self {
        Self { start, frequency }
    }

    /// Date of the given period, `None` if it falls outside chrono's range.
    pub fn date_at(&self, period: usize) -> Option<NaiveDate> {
        let offset = (period as u64).checked_mul(self.frequency.days())?;
        self.start.checked_add_days(Days::new(offset))
    }
}

/// A single (period, date, value) observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Period index, starting at 0
    pub period: usize,
    /// Calendar date of the period
    pub date: NaiveDate,
    /// Observed value
    pub value: f64,
}

/// Gap-free series of values on a calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    calendar: Calendar,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create a series whose value `i` belongs to period `i`.
    ///
    /// # Errors
    /// Returns [`SeriesError::Config`] if the last period's date is not
    /// representable.
    pub fn new(calendar: Calendar, values: Vec<f64>) -> Result<Self> {
        let overflows = values
            .len()
            .checked_sub(1)
            .is_some_and(|last| calendar.date_at(last).is_none());
        if overflows {
            return Err(SeriesError::Config(format!(
                "{} periods from {} overflow the calendar",
                values.len(),
                calendar.start
            )));
        }
        Ok(Self { calendar, values })
    }

    /// Build a series from explicit observations.
    ///
    /// Periods must start at 0 and increase by exactly one; dates must agree
    /// with `calendar`.
    pub fn from_observations(calendar: Calendar, observations: &[Observation]) -> Result<Self> {
        for (expected, obs) in observations.iter().enumerate() {
            if obs.period != expected {
                return Err(SeriesError::PeriodGap {
                    expected,
                    found: obs.period,
                });
            }
            if calendar.date_at(expected) != Some(obs.date) {
                return Err(SeriesError::Config(format!(
                    "Date {} does not match calendar at period {expected}",
                    obs.date
                )));
            }
        }
        Self::new(calendar, observations.iter().map(|o| o.value).collect())
    }

    /// Calendar of this series.
    pub const fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Number of periods.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series holds no periods.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values in period order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value at `period`.
    pub fn value(&self, period: usize) -> Option<f64> {
        self.values.get(period).copied()
    }

    /// Date at `period`, `None` past the end of the series.
    pub fn date(&self, period: usize) -> Option<NaiveDate> {
        if period < self.values.len() {
            self.calendar.date_at(period)
        } else {
            None
        }
    }

    /// Iterate observations in period order.
    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.values.iter().enumerate().filter_map(|(period, &value)| {
            self.calendar.date_at(period).map(|date| Observation {
                period,
                date,
                value,
            })
        })
    }

    /// Trailing window of `len` values ending at (and including) `end`.
    ///
    /// Index 0 of the returned slice is the oldest value. `None` when the
    /// window would start before period 0 or end past the series.
    pub fn trailing_window(&self, end: usize, len: usize) -> Option<&[f64]> {
        if len == 0 || end >= self.values.len() {
            return None;
        }
        let start = (end + 1).checked_sub(len)?;
        Some(&self.values[start..=end])
    }

    /// New series on the same calendar with `f` applied to every value.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            calendar: self.calendar,
            values: self.values.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Smallest value, `None` when empty.
    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    /// Largest value, `None` when empty.
    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Copy the values into an ndarray vector.
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(self.values.clone())
    }
}
