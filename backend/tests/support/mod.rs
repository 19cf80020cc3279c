#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use occupancy_rust::models::RawRecord;
use occupancy_rust::source::{ErrorContext, HistoryWindow, OccupancySource, SourceError, SourceResult};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// Variables are restored on drop (including unwinds) and access is
/// serialized so that parallel tests do not observe each other's changes.
///
/// `Some(v)` sets a variable, `None` removes it.
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::apply(changes);
    f()
}

struct ScopedEnv {
    previous: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn apply(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let previous = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect();

        for (key, value) in changes {
            set_or_remove(key, *value);
        }
        Self { previous }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            set_or_remove(&key, value.as_deref());
        }
    }
}

fn set_or_remove(key: &str, value: Option<&str>) {
    match value {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }
}

pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Local time on 2025-03-`day` in UTC+9.
pub fn jst_at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    jst().with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
}

/// Friday 2025-03-14 22:00 in UTC+9.
pub fn friday_night() -> DateTime<Utc> {
    jst_at(14, 22, 0).with_timezone(&Utc)
}

/// `n` well-formed records every 10 minutes from `start`, with a gently
/// repeating crowd pattern.
pub fn night_records(start: DateTime<FixedOffset>, n: usize, venue: &str) -> Vec<RawRecord> {
    (0..n)
        .map(|i| {
            let ts = start + chrono::Duration::minutes(10 * i as i64);
            let men = 10 + (i % 6) as i64 * 2;
            let women = 8 + (i % 4) as i64 * 3;
            RawRecord::new(ts.to_rfc3339(), men, women).with_store(venue)
        })
        .collect()
}

/// Source that always fails with a retryable unavailability.
pub struct FailingSource;

#[async_trait]
impl OccupancySource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    async fn fetch_records(&self, venue: &str, _window: HistoryWindow) -> SourceResult<Vec<RawRecord>> {
        Err(SourceError::unavailable_with_context(
            "connection refused",
            ErrorContext::new("fetch_records").with_venue(venue).retryable(),
        ))
    }
}

/// Source that answers only after `delay`.
pub struct SlowSource {
    pub delay: Duration,
}

#[async_trait]
impl OccupancySource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    async fn fetch_records(&self, _venue: &str, _window: HistoryWindow) -> SourceResult<Vec<RawRecord>> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}
