use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Width of the aggregation grid in minutes.
pub const BUCKET_MINUTES: u32 = 10;

/// Source of "now" for horizon construction.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Build a fixed offset from a minute count east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Daily operating interval, possibly wrapping past midnight.
///
/// `start_hour = 19, end_hour = 5` covers 19:00 until 05:00 the next morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NightWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            start_hour: 19,
            end_hour: 5,
        }
    }
}

impl NightWindow {
    /// Create a window; hours are taken modulo 24.
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
        }
    }

    /// Whether the window crosses midnight (or spans the whole day).
    pub fn wraps(&self) -> bool {
        self.end_hour <= self.start_hour
    }

    /// Whether a clock hour falls inside the window.
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.wraps() {
            hour >= self.start_hour || hour < self.end_hour
        } else {
            hour >= self.start_hour && hour < self.end_hour
        }
    }

    /// Most recent occurrence of the window relative to `now`.
    ///
    /// The window starts today at `start_hour`, or yesterday if `now` is
    /// still before today's start hour. Returns `(start, end)`.
    pub fn occurrence(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let offset = *now.offset();
        let mut start_date = now.date_naive();
        if now.hour() < self.start_hour {
            start_date = start_date.pred_opt()?;
        }
        let start = at_hour(start_date, self.start_hour, &offset)?;
        let end_date = if self.wraps() {
            start_date.succ_opt()?
        } else {
            start_date
        };
        let end = at_hour(end_date, self.end_hour, &offset)?;
        Some((start, end))
    }

    /// Collection state at `now`: whether collection is active, and the
    /// bounds of the window it belongs to (or the next one, outside it).
    pub fn collection_state(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Option<(bool, DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let offset = *now.offset();
        let today = now.date_naive();
        let mut start = at_hour(today, self.start_hour, &offset)?;
        let mut end = at_hour(today, self.end_hour, &offset)?;

        if self.wraps() {
            if now.hour() < self.end_hour {
                start -= Duration::days(1);
            } else {
                end += Duration::days(1);
            }
        }

        let inside = start <= now && now <= end;
        Some((inside, start, end))
    }
}

fn at_hour(date: NaiveDate, hour: u32, offset: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
    offset.from_local_datetime(&date.and_time(time)).single()
}

/// Floor a timestamp to the start of its clock-aligned bucket (`:00, :10, ...`).
pub fn floor_to_bucket(ts: DateTime<FixedOffset>, width_minutes: u32) -> DateTime<FixedOffset> {
    let width = width_minutes.max(1);
    ts.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .and_then(|d| d.with_minute(d.minute() - d.minute() % width))
        .unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        offset_from_minutes(540)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_contains_hour_wrapping() {
        let w = NightWindow::default();
        assert!(w.contains_hour(19));
        assert!(w.contains_hour(23));
        assert!(w.contains_hour(0));
        assert!(w.contains_hour(4));
        assert!(!w.contains_hour(5));
        assert!(!w.contains_hour(6));
        assert!(!w.contains_hour(18));
    }

    #[test]
    fn test_contains_hour_daytime() {
        let w = NightWindow::new(9, 17);
        assert!(!w.wraps());
        assert!(w.contains_hour(9));
        assert!(w.contains_hour(16));
        assert!(!w.contains_hour(17));
        assert!(!w.contains_hour(20));
        assert!(!w.contains_hour(3));
    }

    #[test]
    fn test_new_wraps_hours_modulo_day() {
        let w = NightWindow::new(43, 29);
        assert_eq!(w, NightWindow::new(19, 5));
    }

    #[test]
    fn test_occurrence_evening() {
        let (start, end) = NightWindow::default()
            .occurrence(jst(2025, 3, 14, 21, 30))
            .unwrap();
        assert_eq!(start, jst(2025, 3, 14, 19, 0));
        assert_eq!(end, jst(2025, 3, 15, 5, 0));
    }

    #[test]
    fn test_occurrence_after_midnight_uses_previous_day() {
        let (start, end) = NightWindow::default()
            .occurrence(jst(2025, 3, 15, 2, 0))
            .unwrap();
        assert_eq!(start, jst(2025, 3, 14, 19, 0));
        assert_eq!(end, jst(2025, 3, 15, 5, 0));
    }

    #[test]
    fn test_occurrence_afternoon_points_at_last_night() {
        let (start, _) = NightWindow::default()
            .occurrence(jst(2025, 3, 15, 15, 0))
            .unwrap();
        assert_eq!(start, jst(2025, 3, 14, 19, 0));
    }

    #[test]
    fn test_collection_state() {
        let w = NightWindow::default();
        let (inside, start, end) = w.collection_state(jst(2025, 3, 15, 1, 0)).unwrap();
        assert!(inside);
        assert_eq!(start, jst(2025, 3, 14, 19, 0));
        assert_eq!(end, jst(2025, 3, 15, 5, 0));

        let (inside, start, end) = w.collection_state(jst(2025, 3, 15, 12, 0)).unwrap();
        assert!(!inside);
        assert_eq!(start, jst(2025, 3, 15, 19, 0));
        assert_eq!(end, jst(2025, 3, 16, 5, 0));
    }

    #[test]
    fn test_floor_to_bucket() {
        let ts = jst(2025, 3, 14, 21, 7) + Duration::seconds(42);
        assert_eq!(floor_to_bucket(ts, BUCKET_MINUTES), jst(2025, 3, 14, 21, 0));
        assert_eq!(
            floor_to_bucket(jst(2025, 3, 14, 21, 10), BUCKET_MINUTES),
            jst(2025, 3, 14, 21, 10)
        );
        assert_eq!(
            floor_to_bucket(jst(2025, 3, 14, 21, 59), BUCKET_MINUTES),
            jst(2025, 3, 14, 21, 50)
        );
    }

    #[test]
    fn test_fixed_clock() {
        let instant = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
