use chrono::{DateTime, FixedOffset, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::api::QualityWindow;
use crate::forecast::calibration::percentile;
use crate::models::Observation;
use crate::scoring::{OccupancyScorer, ScoreInput, WindowSegmenter};

/// Points at which a weekly report counts as fully reliable.
const RELIABLE_POINTS: f64 = 200.0;

/// Number of best windows highlighted in a report.
const TOP_WINDOWS: usize = 3;

/// Observed time span of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightPeriod {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

/// Parameters a report was computed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightParams {
    pub threshold: f64,
    pub min_duration_minutes: f64,
    pub ideal: f64,
    pub gender_weight: f64,
    pub occupancy_baseline: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightMetrics {
    pub points_used: usize,
    pub baseline_p95_total: f64,
    pub reliability_score: f64,
}

/// Weekly quality-window report for one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyInsight {
    pub analysis_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub store: String,
    pub generated_at: DateTime<Utc>,
    pub period: InsightPeriod,
    pub params: InsightParams,
    pub metrics: InsightMetrics,
    pub windows: Vec<QualityWindow>,
    pub top_windows: Vec<QualityWindow>,
}

/// Occupancy baseline: 95th percentile of totals, or 0 when not positive.
pub(crate) fn occupancy_baseline(observations: &[Observation]) -> f64 {
    let totals: Vec<f64> = observations.iter().map(|o| f64::from(o.total)).collect();
    let baseline = percentile(&totals, 95.0);
    if baseline > 0.0 {
        baseline
    } else {
        0.0
    }
}

/// Score inputs for every observation with at least one person present.
pub(crate) fn score_inputs(observations: &[Observation], baseline: f64) -> Vec<ScoreInput> {
    observations
        .iter()
        .filter_map(|o| {
            let men = f64::from(o.men);
            let women = f64::from(o.women);
            let present = men + women;
            if present <= 0.0 {
                return None;
            }
            let occupancy = if baseline > 0.0 {
                (f64::from(o.total) / baseline).min(1.0)
            } else {
                0.0
            };
            Some(ScoreInput::new(o.ts, women / present, occupancy))
        })
        .collect()
}

/// Best windows by average score, highest first.
pub(crate) fn top_windows(windows: &[QualityWindow], n: usize) -> Vec<QualityWindow> {
    let mut sorted = windows.to_vec();
    sorted.sort_by(|a, b| {
        b.avg_score
            .partial_cmp(&a.avg_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(n);
    sorted
}

/// Builds weekly reports with a fixed scorer and segmenter.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsightService {
    scorer: OccupancyScorer,
    segmenter: WindowSegmenter,
}

impl InsightService {
    pub fn new(scorer: OccupancyScorer, segmenter: WindowSegmenter) -> Self {
        Self { scorer, segmenter }
    }

    /// Quality windows over a venue's observations.
    pub fn quality_windows(&self, observations: &[Observation]) -> Vec<QualityWindow> {
        let baseline = occupancy_baseline(observations);
        let scored = self.scorer.score_all(&score_inputs(observations, baseline));
        self.segmenter.segment(scored)
    }

    /// Full weekly report. `generated_at` also dates the analysis id.
    pub fn weekly_report(
        &self,
        store: &str,
        observations: &[Observation],
        generated_at: DateTime<Utc>,
    ) -> WeeklyInsight {
        let baseline = occupancy_baseline(observations);
        let inputs = score_inputs(observations, baseline);
        let points_used = inputs.len();
        let windows = self.segmenter.segment(self.scorer.score_all(&inputs));
        let top = top_windows(&windows, TOP_WINDOWS);

        info!(
            "occupancy.insights.weekly store={} points={} windows={}",
            store,
            points_used,
            windows.len()
        );

        WeeklyInsight {
            analysis_id: format!("weekly:{}:{}", store, generated_at.date_naive()),
            kind: "weekly".to_string(),
            store: store.to_string(),
            generated_at,
            period: InsightPeriod {
                start: observations.iter().map(|o| o.ts).min(),
                end: observations.iter().map(|o| o.ts).max(),
            },
            params: InsightParams {
                threshold: self.segmenter.threshold,
                min_duration_minutes: self.segmenter.min_duration_minutes,
                ideal: self.scorer.ideal,
                gender_weight: self.scorer.gender_weight,
                occupancy_baseline: baseline,
            },
            metrics: InsightMetrics {
                points_used,
                baseline_p95_total: baseline,
                reliability_score: (points_used as f64 / RELIABLE_POINTS).min(1.0),
            },
            windows,
            top_windows: top,
        }
    }
}

#[cfg(test)]
#[path = "insights_tests.rs"]
mod insights_tests;
