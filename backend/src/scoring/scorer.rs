//! Point quality score.
//!
//! `score = alignment(occupancy) x balance(female_ratio) x stability`, each
//! factor and the product clamped to `[0, 1]`.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::api::ScoredPoint;

/// Clamp to `[0, 1]`; NaN and infinities map to 0.
pub fn clamp01(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// How close `occupancy` is to `ideal`, linearly falling to 0 at both ends.
pub fn occupancy_alignment(occupancy: f64, ideal: f64) -> f64 {
    let occ = clamp01(occupancy);
    let ideal = clamp01(ideal);
    if ideal <= 0.0 {
        return clamp01(1.0 - occ);
    }
    if ideal >= 1.0 {
        return occ;
    }
    if occ <= ideal {
        clamp01(1.0 - (ideal - occ) / ideal)
    } else {
        clamp01(1.0 - (occ - ideal) / (1.0 - ideal))
    }
}

/// Female share mapped around 0.5 with slope `weight` (floored at 0).
pub fn gender_balance(female_ratio: f64, weight: f64) -> f64 {
    let fr = clamp01(female_ratio);
    let weight = if weight.is_nan() { 0.0 } else { weight.max(0.0) };
    clamp01(0.5 + (fr - 0.5) * weight)
}

/// Inputs for one historical point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreInput {
    pub ts: DateTime<FixedOffset>,
    pub female_ratio: f64,
    pub occupancy: f64,
    #[serde(default = "default_stability")]
    pub stability: f64,
}

fn default_stability() -> f64 {
    1.0
}

impl ScoreInput {
    pub fn new(ts: DateTime<FixedOffset>, female_ratio: f64, occupancy: f64) -> Self {
        Self {
            ts,
            female_ratio,
            occupancy,
            stability: default_stability(),
        }
    }

    pub fn with_stability(mut self, stability: f64) -> Self {
        self.stability = stability;
        self
    }
}

/// Pure, total scoring function with fixed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyScorer {
    pub ideal: f64,
    pub gender_weight: f64,
}

impl Default for OccupancyScorer {
    fn default() -> Self {
        Self {
            ideal: 0.7,
            gender_weight: 1.5,
        }
    }
}

impl OccupancyScorer {
    pub fn new(ideal: f64, gender_weight: f64) -> Self {
        Self {
            ideal,
            gender_weight,
        }
    }

    pub fn score(&self, female_ratio: f64, occupancy: f64, stability: f64) -> f64 {
        let alignment = occupancy_alignment(occupancy, self.ideal);
        let balance = gender_balance(female_ratio, self.gender_weight);
        clamp01(alignment * balance * clamp01(stability))
    }

    pub fn score_input(&self, input: &ScoreInput) -> ScoredPoint {
        ScoredPoint::new(
            input.ts,
            self.score(input.female_ratio, input.occupancy, input.stability),
        )
    }

    pub fn score_all(&self, inputs: &[ScoreInput]) -> Vec<ScoredPoint> {
        inputs.iter().map(|input| self.score_input(input)).collect()
    }
}
