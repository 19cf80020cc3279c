//! Occupancy data sources.
//!
//! The analytics core never talks to a transport directly: remote stores,
//! spreadsheets and scraped feeds all sit behind [`OccupancySource`], which
//! hands back untyped [`RawRecord`]s for normalization.

pub mod error;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

pub use error::{ErrorContext, SourceError, SourceResult};
pub use local::{InMemorySource, JsonFileSource};

use crate::models::RawRecord;

/// How much history a fetch should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Look-back in days from `until`, at least one.
    pub days: u32,
    /// Cap on the number of records, keeping the newest.
    pub limit: Option<usize>,
    /// End of the look-back.
    pub until: DateTime<Utc>,
}

impl HistoryWindow {
    pub fn new(days: u32, limit: Option<usize>, until: DateTime<Utc>) -> Self {
        Self { days, limit, until }
    }

    /// Start of the look-back.
    pub fn since(&self) -> DateTime<Utc> {
        self.until - Duration::days(i64::from(self.days.max(1)))
    }

    /// Whether an instant falls inside `[since, until]`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since() <= ts && ts <= self.until
    }
}

/// Provider of raw occupancy records for a venue.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the forecast service shares them
/// behind `Arc` across concurrent requests.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    /// Short identifier used in logs and error context.
    fn name(&self) -> &str;

    /// Fetch records for `venue`.
    ///
    /// Records belonging to other venues may be included; normalization
    /// drops them. Malformed records are returned as-is.
    ///
    /// # Returns
    /// * `Ok(Vec<RawRecord>)` - Possibly empty list of records
    /// * `Err(SourceError)` - If the source cannot produce a record list
    async fn fetch_records(&self, venue: &str, window: HistoryWindow) -> SourceResult<Vec<RawRecord>>;
}

/// Keep the newest `limit` records, preserving their relative order.
///
/// Records whose timestamp does not parse sort first and are the first to
/// be dropped.
pub(crate) fn keep_newest(records: Vec<RawRecord>, limit: Option<usize>) -> Vec<RawRecord> {
    let Some(limit) = limit else {
        return records;
    };
    if records.len() <= limit {
        return records;
    }

    let mut indexed: Vec<(Option<DateTime<Utc>>, usize)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (parsed_utc(r), i))
        .collect();
    indexed.sort();
    let mut keep: Vec<usize> = indexed
        .into_iter()
        .rev()
        .take(limit)
        .map(|(_, i)| i)
        .collect();
    keep.sort_unstable();

    let mut slots: Vec<Option<RawRecord>> = records.into_iter().map(Some).collect();
    keep.into_iter().filter_map(|i| slots[i].take()).collect()
}

pub(crate) fn parsed_utc(record: &RawRecord) -> Option<DateTime<Utc>> {
    record
        .ts
        .as_ref()
        .and_then(|field| field.parse().ok())
        .map(|ts| ts.with_timezone(&Utc))
}
