//! Split-conformal interval calibration.
//!
//! The point model is fit on the leading slice of the history; residuals on
//! the trailing slice give fixed additive offsets for the 10th and 90th
//! percentile. The band has constant width and is recomputed on every refit.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Percentile with linear interpolation between closest ranks.
///
/// `percent` is in `[0, 100]`. An empty input yields 0.
pub fn percentile(values: &[f64], percent: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }

    let rank = (sorted.len() - 1) as f64 * (percent.clamp(0.0, 100.0) / 100.0);
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    if lower == upper {
        return sorted[lower];
    }
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}

/// Number of leading rows used for fitting when `n` rows are split
/// chronologically, or `None` when fewer than two rows exist.
///
/// Both slices keep at least one row.
pub fn chronological_split(n: usize, validation_fraction: f64) -> Option<usize> {
    if n < 2 {
        return None;
    }
    let fraction = if validation_fraction.is_finite() {
        validation_fraction.clamp(0.0, 1.0)
    } else {
        0.2
    };
    let train = (n as f64 * (1.0 - fraction)).floor() as usize;
    Some(train.clamp(1, n - 1))
}

/// Additive offsets applied to a point prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IntervalOffsets {
    pub low: f64,
    pub high: f64,
}

impl IntervalOffsets {
    /// Offsets from validation residuals (`actual - predicted`).
    ///
    /// `low` is capped at 0 and `high` floored at 0 so the band always
    /// brackets the point prediction.
    pub fn from_residuals(residuals: &[f64]) -> Self {
        let finite: Vec<f64> = residuals.iter().copied().filter(|r| r.is_finite()).collect();
        Self {
            low: percentile(&finite, 10.0).min(0.0),
            high: percentile(&finite, 90.0).max(0.0),
        }
    }

    /// Band around `point`, before clipping.
    pub fn band(&self, point: f64) -> Band {
        Band {
            p10: point + self.low,
            p50: point,
            p90: point + self.high,
        }
    }
}

/// Lower, middle and upper prediction for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

impl Band {
    /// Each bound floored at zero independently.
    pub fn clipped(self) -> Self {
        Self {
            p10: self.p10.max(0.0),
            p50: self.p50.max(0.0),
            p90: self.p90.max(0.0),
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.p10 <= self.p50 && self.p50 <= self.p90
    }
}

impl std::ops::Add for Band {
    type Output = Band;

    fn add(self, rhs: Band) -> Band {
        Band {
            p10: self.p10 + rhs.p10,
            p50: self.p50 + rhs.p50,
            p90: self.p90 + rhs.p90,
        }
    }
}
