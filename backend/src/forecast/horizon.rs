//! Future timestamp grids for the two supported horizons.

use chrono::{DateTime, Duration, FixedOffset};

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::NightWindow;

/// Which future a forecast covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// One hour past the newest observation (or past now, without history).
    NextHour,
    /// The most recent occurrence of a night window.
    Night(NightWindow),
}

/// Number of steps in one hour at `cadence_min`, at least one.
pub fn periods_per_hour(cadence_min: u32) -> usize {
    (60 / cadence_min.max(1)).max(1) as usize
}

/// `periods_per_hour(cadence)` timestamps, the first one cadence after
/// `last` (or after `now` when there is no history).
pub fn rolling_horizon(
    last: Option<DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
    cadence_min: u32,
) -> Vec<DateTime<FixedOffset>> {
    let step = Duration::minutes(i64::from(cadence_min.max(1)));
    let anchor = last.unwrap_or(now);
    (1..=periods_per_hour(cadence_min) as i32)
        .map(|k| anchor + step * k)
        .collect()
}

/// Cadence-spaced timestamps from the window start (inclusive) to its end
/// (exclusive), for the occurrence of `window` that `now` points at.
pub fn night_horizon(
    window: &NightWindow,
    now: DateTime<FixedOffset>,
    cadence_min: u32,
) -> AnalyticsResult<Vec<DateTime<FixedOffset>>> {
    let (start, end) = window.occurrence(now).ok_or_else(|| {
        AnalyticsError::InvalidTime(format!(
            "no {}:00-{}:00 window around {}",
            window.start_hour,
            window.end_hour,
            now.to_rfc3339()
        ))
    })?;

    let step = Duration::minutes(i64::from(cadence_min.max(1)));
    let mut out = Vec::new();
    let mut ts = start;
    while ts < end {
        out.push(ts);
        ts += step;
    }
    Ok(out)
}

impl Horizon {
    /// Timestamps for this horizon.
    pub fn timestamps(
        &self,
        last: Option<DateTime<FixedOffset>>,
        now: DateTime<FixedOffset>,
        cadence_min: u32,
    ) -> AnalyticsResult<Vec<DateTime<FixedOffset>>> {
        match self {
            Horizon::NextHour => Ok(rolling_horizon(last, now, cadence_min)),
            Horizon::Night(window) => night_horizon(window, now, cadence_min),
        }
    }

    pub fn window(&self) -> Option<NightWindow> {
        match self {
            Horizon::NextHour => None,
            Horizon::Night(window) => Some(*window),
        }
    }
}
