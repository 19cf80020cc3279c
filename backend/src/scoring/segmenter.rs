//! Maximal runs of high-quality points.

use serde::{Deserialize, Serialize};

use crate::api::{QualityWindow, ScoredPoint};

/// Splits a scored series into windows that stay at or above `threshold`
/// for at least `min_duration_minutes`.
///
/// Duration is measured from the first to the last member of a run, so a
/// single point has duration zero. Gaps between consecutive members do not
/// break a run; only a point below the threshold does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSegmenter {
    pub threshold: f64,
    pub min_duration_minutes: f64,
}

impl Default for WindowSegmenter {
    fn default() -> Self {
        Self {
            threshold: 0.8,
            min_duration_minutes: 120.0,
        }
    }
}

impl WindowSegmenter {
    pub fn new(threshold: f64, min_duration_minutes: f64) -> Self {
        Self {
            threshold,
            min_duration_minutes,
        }
    }

    /// Windows in ascending start order; they never overlap.
    pub fn segment(&self, mut points: Vec<ScoredPoint>) -> Vec<QualityWindow> {
        points.sort_by_key(|p| p.ts);

        let mut windows = Vec::new();
        let mut run: Vec<ScoredPoint> = Vec::new();
        for point in points {
            if point.score >= self.threshold {
                run.push(point);
            } else {
                self.flush(&mut run, &mut windows);
            }
        }
        self.flush(&mut run, &mut windows);
        windows
    }

    fn flush(&self, run: &mut Vec<ScoredPoint>, windows: &mut Vec<QualityWindow>) {
        let (Some(first), Some(last)) = (run.first(), run.last()) else {
            return;
        };
        let duration_minutes = (last.ts - first.ts).num_milliseconds() as f64 / 60_000.0;
        if duration_minutes >= self.min_duration_minutes {
            let avg_score = run.iter().map(|p| p.score).sum::<f64>() / run.len() as f64;
            windows.push(QualityWindow {
                start: first.ts,
                end: last.ts,
                duration_minutes,
                avg_score,
            });
        }
        run.clear();
    }
}

#[cfg(test)]
#[path = "segmenter_tests.rs"]
mod segmenter_tests;
