//! Night-window 10-minute aggregation.
//!
//! Irregular snapshots are averaged into absolute clock buckets
//! (`:00, :10, :20, ...`) in the venue's offset. Only hours inside the night
//! window are kept and buckets without observations are not emitted.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Timelike};
use log::debug;

use crate::api::AggregatedBucket;
use crate::models::{floor_to_bucket, NightWindow, Observation, BUCKET_MINUTES};

/// Averages observations into fixed-width buckets.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    window: NightWindow,
    offset: FixedOffset,
}

#[derive(Default)]
struct Accumulator {
    men: f64,
    women: f64,
    count: usize,
}

impl Aggregator {
    pub fn new(window: NightWindow, offset: FixedOffset) -> Self {
        Self { window, offset }
    }

    /// Aggregate observations, optionally restricted to one venue.
    ///
    /// Observations without a venue always pass the venue filter.
    pub fn aggregate(&self, observations: &[Observation], venue: Option<&str>) -> Vec<AggregatedBucket> {
        let mut buckets: BTreeMap<DateTime<FixedOffset>, Accumulator> = BTreeMap::new();
        let mut outside = 0usize;

        for obs in observations {
            if let (Some(wanted), Some(found)) = (venue, obs.venue.as_deref()) {
                if wanted != found {
                    continue;
                }
            }
            let local = obs.ts.with_timezone(&self.offset);
            if !self.window.contains_hour(local.hour()) {
                outside += 1;
                continue;
            }
            let acc = buckets
                .entry(floor_to_bucket(local, BUCKET_MINUTES))
                .or_default();
            acc.men += f64::from(obs.men);
            acc.women += f64::from(obs.women);
            acc.count += 1;
        }

        debug!(
            "occupancy.aggregate.done buckets={} outside_window={}",
            buckets.len(),
            outside
        );

        buckets
            .into_iter()
            .map(|(ts, acc)| {
                let n = acc.count as f64;
                let men = acc.men / n;
                let women = acc.women / n;
                AggregatedBucket {
                    ts,
                    men,
                    women,
                    total: men.max(0.0) + women.max(0.0),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::offset_from_minutes;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        offset_from_minutes(540).unwrap()
    }

    fn obs(d: u32, h: u32, mi: u32, men: u32, women: u32) -> Observation {
        Observation::new(jst().with_ymd_and_hms(2025, 3, d, h, mi, 0).unwrap(), men, women)
    }

    #[test]
    fn test_bucket_average() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        let out = aggregator.aggregate(&[obs(14, 21, 3, 4, 2), obs(14, 21, 7, 6, 4)], None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ts, jst().with_ymd_and_hms(2025, 3, 14, 21, 0, 0).unwrap());
        assert_eq!(out[0].men, 5.0);
        assert_eq!(out[0].women, 3.0);
        assert_eq!(out[0].total, 8.0);
    }

    #[test]
    fn test_outside_window_excluded() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        let out = aggregator.aggregate(&[obs(15, 6, 30, 4, 4), obs(15, 4, 59, 1, 1)], None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ts.hour(), 4);
        assert_eq!(out[0].ts.minute(), 50);
    }

    #[test]
    fn test_no_empty_buckets_and_ascending() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        let out = aggregator.aggregate(
            &[obs(14, 23, 45, 1, 1), obs(14, 20, 0, 2, 2), obs(14, 20, 9, 4, 4)],
            None,
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].ts < out[1].ts);
        assert_eq!(out[0].men, 3.0);
    }

    #[test]
    fn test_venue_filter_keeps_unlabelled() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        let records = vec![
            obs(14, 21, 0, 2, 2).with_venue("ebisu"),
            obs(14, 21, 1, 8, 8).with_venue("shibuya"),
            obs(14, 21, 2, 4, 4),
        ];
        let out = aggregator.aggregate(&records, Some("ebisu"));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].men, 3.0);
    }

    #[test]
    fn test_converts_to_configured_offset() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        let utc = FixedOffset::east_opt(0).unwrap();
        // 12:05 UTC is 21:05 JST
        let o = Observation::new(utc.with_ymd_and_hms(2025, 3, 14, 12, 5, 0).unwrap(), 1, 1);
        let out = aggregator.aggregate(&[o], None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].ts.offset().local_minus_utc(), 9 * 3600);
        assert_eq!(out[0].ts.hour(), 21);
    }

    #[test]
    fn test_daytime_window() {
        let aggregator = Aggregator::new(NightWindow::new(9, 17), jst());
        let out = aggregator.aggregate(&[obs(14, 10, 0, 1, 1), obs(14, 21, 0, 1, 1)], None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_empty() {
        let aggregator = Aggregator::new(NightWindow::default(), jst());
        assert!(aggregator.aggregate(&[], Some("ebisu")).is_empty());
    }
}
