//! Public output types of the analytics core.
//!
//! All types derive Serialize/Deserialize for JSON serialization; timestamps
//! serialize as RFC 3339 with their offset.

pub use crate::services::insights::{InsightMetrics, InsightParams, InsightPeriod, WeeklyInsight};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::forecast::ModelOutput;

/// Error code carried by failure envelopes.
pub const UPSTREAM_DATA_ERROR: &str = "upstream_data_error";

/// One forecast timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub ts: DateTime<FixedOffset>,
    pub men_pred: f64,
    pub women_pred: f64,
    pub total_pred: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub men_p10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub men_p50: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub men_p90: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub women_p10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub women_p50: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub women_p90: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_p10: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_p50: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_p90: Option<f64>,
}

impl PredictionPoint {
    /// All-zero point, used when there is no history at all.
    pub fn zero(ts: DateTime<FixedOffset>, with_interval: bool) -> Self {
        let band = with_interval.then_some(0.0);
        Self {
            ts,
            men_pred: 0.0,
            women_pred: 0.0,
            total_pred: 0.0,
            men_p10: band,
            men_p50: band,
            men_p90: band,
            women_p10: band,
            women_p50: band,
            women_p90: band,
            total_p10: band,
            total_p50: band,
            total_p90: band,
        }
    }

    pub fn from_output(ts: DateTime<FixedOffset>, output: &ModelOutput) -> Self {
        let interval = output.interval.as_ref();
        Self {
            ts,
            men_pred: output.men,
            women_pred: output.women,
            total_pred: output.total,
            men_p10: interval.map(|i| i.men.p10),
            men_p50: interval.map(|i| i.men.p50),
            men_p90: interval.map(|i| i.men.p90),
            women_p10: interval.map(|i| i.women.p10),
            women_p50: interval.map(|i| i.women.p50),
            women_p90: interval.map(|i| i.women.p90),
            total_p10: interval.map(|i| i.total.p10),
            total_p50: interval.map(|i| i.total.p50),
            total_p90: interval.map(|i| i.total.p90),
        }
    }

    pub fn has_interval(&self) -> bool {
        self.total_p50.is_some()
    }
}

/// Forecast response.
///
/// `ok: true` with empty `data` means either "no future slots" or an
/// internal fault; only `degraded` (never serialized) tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEnvelope {
    pub ok: bool,
    pub store: String,
    pub freq_min: u32,
    pub data: Vec<PredictionPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_h: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_h: Option<u32>,
    #[serde(skip)]
    pub degraded: Option<String>,
}

impl ForecastEnvelope {
    pub fn success(store: impl Into<String>, freq_min: u32, data: Vec<PredictionPoint>) -> Self {
        Self {
            ok: true,
            store: store.into(),
            freq_min,
            data,
            error: None,
            detail: None,
            start_h: None,
            end_h: None,
            degraded: None,
        }
    }

    /// Upstream failure: no data, `error = "upstream_data_error"`.
    pub fn upstream_failure(store: impl Into<String>, freq_min: u32, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(UPSTREAM_DATA_ERROR.to_string()),
            detail: Some(detail.into()),
            ..Self::success(store, freq_min, Vec::new())
        }
    }

    /// Internal fault: looks like an empty success on the wire.
    pub fn degraded(store: impl Into<String>, freq_min: u32, reason: impl Into<String>) -> Self {
        Self {
            degraded: Some(reason.into()),
            ..Self::success(store, freq_min, Vec::new())
        }
    }

    pub fn with_hours(mut self, start_h: u32, end_h: u32) -> Self {
        self.start_h = Some(start_h);
        self.end_h = Some(end_h);
        self
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Quality score of one historical time point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub ts: DateTime<FixedOffset>,
    pub score: f64,
}

impl ScoredPoint {
    pub fn new(ts: DateTime<FixedOffset>, score: f64) -> Self {
        Self { ts, score }
    }
}

/// Maximal run of points at or above the quality threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_minutes: f64,
    pub avg_score: f64,
}

/// Averaged counts of one 10-minute bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedBucket {
    pub ts: DateTime<FixedOffset>,
    pub men: f64,
    pub women: f64,
    pub total: f64,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod api_tests;
