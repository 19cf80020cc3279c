//! Feature engineering for the forecast model.
//!
//! Every row of a [`FeatureTable`] encodes one point of the input sequence:
//! its clock position and the recent history of both target series. Rows with
//! unset targets (future placeholders) take their lag and moving-average
//! values from the tail of real history through the fill policy, never from
//! earlier predictions.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::models::Observation;

/// Number of columns in every feature row.
pub const FEATURE_COUNT: usize = 16;

/// Column names, in row order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "hour",
    "minute",
    "dow",
    "is_weekend",
    "sin_time",
    "cos_time",
    "men_lag_1",
    "men_lag_2",
    "men_lag_4",
    "men_ma_2",
    "men_ma_4",
    "women_lag_1",
    "women_lag_2",
    "women_lag_4",
    "women_ma_2",
    "women_ma_4",
];

const LAGS: [usize; 3] = [1, 2, 4];
const WINDOWS: [usize; 2] = [2, 4];
const MINUTES_PER_DAY: f64 = 1440.0;

/// One feature row.
pub type FeatureRow = [f64; FEATURE_COUNT];

/// A point of the input sequence. Targets are `None` for future rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub ts: DateTime<FixedOffset>,
    pub men: Option<f64>,
    pub women: Option<f64>,
}

impl SeriesPoint {
    /// A row to be predicted.
    pub fn placeholder(ts: DateTime<FixedOffset>) -> Self {
        Self {
            ts,
            men: None,
            women: None,
        }
    }
}

impl From<&Observation> for SeriesPoint {
    fn from(obs: &Observation) -> Self {
        Self {
            ts: obs.ts,
            men: Some(obs.men as f64),
            women: Some(obs.women as f64),
        }
    }
}

/// Fixed-shape numeric table, one row per input point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Values of a named column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = FEATURE_NAMES.iter().position(|n| *n == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Rows `[start, end)` as a new table.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        Self {
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Last `n` rows as a new table.
    pub fn tail(&self, n: usize) -> Self {
        let len = self.rows.len();
        self.slice(len.saturating_sub(n), len)
    }
}

/// Turns an ordered sequence into a [`FeatureTable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Features for a sequence of real observations.
    pub fn build(&self, observations: &[Observation]) -> FeatureTable {
        let points: Vec<SeriesPoint> = observations.iter().map(SeriesPoint::from).collect();
        self.build_series(&points)
    }

    /// Features for history followed by placeholder rows at `future`.
    ///
    /// The returned table covers history and future; callers usually keep
    /// only its tail.
    pub fn build_with_future(
        &self,
        history: &[Observation],
        future: &[DateTime<FixedOffset>],
    ) -> FeatureTable {
        let mut points: Vec<SeriesPoint> = history.iter().map(SeriesPoint::from).collect();
        points.extend(future.iter().copied().map(SeriesPoint::placeholder));
        self.build_series(&points)
    }

    /// Features for an arbitrary sequence; the input order is authoritative.
    pub fn build_series(&self, points: &[SeriesPoint]) -> FeatureTable {
        if points.is_empty() {
            return FeatureTable::default();
        }

        let men: Vec<Option<f64>> = points.iter().map(|p| p.men).collect();
        let women: Vec<Option<f64>> = points.iter().map(|p| p.women).collect();

        let mut history_columns: Vec<Vec<f64>> = Vec::with_capacity(10);
        for series in [&men, &women] {
            for lag in LAGS {
                history_columns.push(resolve(shift(series, lag)));
            }
            for window in WINDOWS {
                history_columns.push(resolve(rolling_mean(series, window)));
            }
        }

        let rows = points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let mut row = [0.0; FEATURE_COUNT];
                row[..6].copy_from_slice(&time_fields(&point.ts));
                for (offset, column) in history_columns.iter().enumerate() {
                    row[6 + offset] = column[i];
                }
                row
            })
            .collect();

        FeatureTable { rows }
    }
}

/// `hour, minute, dow, is_weekend, sin_time, cos_time` for one timestamp.
fn time_fields(ts: &DateTime<FixedOffset>) -> [f64; 6] {
    let hour = ts.hour();
    let minute = ts.minute();
    let dow = ts.weekday().num_days_from_monday();
    // Friday and Saturday nights
    let is_weekend = if dow == 4 || dow == 5 { 1.0 } else { 0.0 };
    let minutes = (hour * 60 + minute) as f64;
    let angle = 2.0 * PI * minutes / MINUTES_PER_DAY;
    [
        hour as f64,
        minute as f64,
        dow as f64,
        is_weekend,
        angle.sin(),
        angle.cos(),
    ]
}

/// Value `k` positions back in sequence order.
fn shift(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| if i >= k { values[i - k] } else { None })
        .collect()
}

/// Mean of the present values among the last `window` positions.
fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

/// Backward-fill, then forward-fill; a column with no value at all becomes 0.
fn resolve(mut column: Vec<Option<f64>>) -> Vec<f64> {
    let mut next = None;
    for value in column.iter_mut().rev() {
        match value {
            Some(v) => next = Some(*v),
            None => *value = next,
        }
    }
    let mut prev = None;
    for value in column.iter_mut() {
        match value {
            Some(v) => prev = Some(*v),
            None => *value = prev,
        }
    }
    column.into_iter().map(|v| v.unwrap_or(0.0)).collect()
}
