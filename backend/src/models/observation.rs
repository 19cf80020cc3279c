//! Occupancy observations and the lenient wire records they are built from.
//!
//! Data sources hand over [`RawRecord`]s whose fields may be missing or of the
//! wrong type. [`normalize_records`] turns them into validated, time-ordered
//! [`Observation`]s and skips (never aborts on) anything malformed.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

/// A single timestamped occupancy snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub ts: DateTime<FixedOffset>,
    pub men: u32,
    pub women: u32,
    pub total: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

impl Observation {
    /// Create an observation with `total = men + women`.
    pub fn new(ts: DateTime<FixedOffset>, men: u32, women: u32) -> Self {
        Self {
            ts,
            men,
            women,
            total: men.saturating_add(women),
            venue: None,
        }
    }

    pub fn with_total(mut self, total: u32) -> Self {
        self.total = total;
        self
    }

    pub fn with_venue(mut self, venue: impl Into<String>) -> Self {
        self.venue = Some(venue.into());
        self
    }

    /// Same observation expressed in another offset.
    pub fn in_offset(&self, offset: &FixedOffset) -> Self {
        Self {
            ts: self.ts.with_timezone(offset),
            ..self.clone()
        }
    }

    /// Validate a raw record.
    pub fn from_raw(raw: &RawRecord) -> Result<Self, MalformedRecord> {
        let ts = match &raw.ts {
            None => return Err(MalformedRecord::MissingTimestamp),
            Some(field) => field.parse()?,
        };

        let men = parse_count(raw.men.as_ref(), "men")?;
        let women = parse_count(raw.women.as_ref(), "women")?;
        let total = raw
            .total
            .as_ref()
            .and_then(|field| field.as_count())
            .unwrap_or_else(|| men.saturating_add(women));

        Ok(Self {
            ts,
            men,
            women,
            total,
            venue: raw.venue(),
        })
    }
}

/// Why a raw record was skipped.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedRecord {
    #[error("record has no timestamp")]
    MissingTimestamp,
    #[error("unparsable timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("field `{0}` is not a non-negative count")]
    InvalidCount(&'static str),
}

/// Timestamp as it arrives on the wire: ISO 8601 text or a Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampField {
    Text(String),
    Epoch(f64),
    Invalid(serde_json::Value),
}

impl TimestampField {
    /// Parse into an offset-aware instant. Naive text is read as UTC; epochs
    /// above 1e12 are taken as milliseconds.
    pub fn parse(&self) -> Result<DateTime<FixedOffset>, MalformedRecord> {
        match self {
            Self::Text(text) => parse_timestamp(text),
            Self::Epoch(value) => {
                if !value.is_finite() {
                    return Err(MalformedRecord::InvalidTimestamp(value.to_string()));
                }
                let seconds = if *value > 1e12 { value / 1000.0 } else { *value };
                let whole = seconds.floor();
                let nanos = ((seconds - whole) * 1e9) as u32;
                DateTime::<Utc>::from_timestamp(whole as i64, nanos)
                    .map(|dt| dt.fixed_offset())
                    .ok_or_else(|| MalformedRecord::InvalidTimestamp(value.to_string()))
            }
            Self::Invalid(value) => Err(MalformedRecord::InvalidTimestamp(value.to_string())),
        }
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, MalformedRecord> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MalformedRecord::MissingTimestamp);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, format) {
            return Ok(dt);
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    Err(MalformedRecord::InvalidTimestamp(trimmed.to_string()))
}

/// Count as it arrives on the wire: integer, float or numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CountField {
    Int(i64),
    Float(f64),
    Text(String),
    Invalid(serde_json::Value),
}

impl CountField {
    /// Interpret as a non-negative count.
    ///
    /// Floats and numeric strings are accepted only when they hold a whole
    /// number (`4.0`, `"4.0"`); a fractional value such as `4.7` is not a
    /// count and yields `None`, so the record is skipped rather than rounded.
    pub fn as_count(&self) -> Option<u32> {
        match self {
            Self::Int(v) => u32::try_from(*v).ok(),
            Self::Float(v) => whole_count(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok().and_then(whole_count),
            Self::Invalid(_) => None,
        }
    }
}

fn whole_count(value: f64) -> Option<u32> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}

fn parse_count(field: Option<&CountField>, name: &'static str) -> Result<u32, MalformedRecord> {
    match field {
        None => Ok(0),
        Some(value) => value.as_count().ok_or(MalformedRecord::InvalidCount(name)),
    }
}

/// Venue identifier: usually a slug, sometimes a numeric id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VenueField {
    Text(String),
    Number(i64),
    Invalid(serde_json::Value),
}

/// Untyped occupancy record as produced by an external data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "timestamp")]
    pub ts: Option<TimestampField>,
    #[serde(default)]
    pub men: Option<CountField>,
    #[serde(default)]
    pub women: Option<CountField>,
    #[serde(default)]
    pub total: Option<CountField>,
    #[serde(default, alias = "store_id")]
    pub store: Option<VenueField>,
}

impl RawRecord {
    /// Well-formed record with integer counts.
    pub fn new(ts: impl Into<String>, men: i64, women: i64) -> Self {
        Self {
            ts: Some(TimestampField::Text(ts.into())),
            men: Some(CountField::Int(men)),
            women: Some(CountField::Int(women)),
            total: None,
            store: None,
        }
    }

    pub fn with_total(mut self, total: i64) -> Self {
        self.total = Some(CountField::Int(total));
        self
    }

    pub fn with_store(mut self, store: impl Into<String>) -> Self {
        self.store = Some(VenueField::Text(store.into()));
        self
    }

    /// Venue identifier carried by the record, if usable.
    pub fn venue(&self) -> Option<String> {
        match &self.store {
            Some(VenueField::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(VenueField::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Timestamp as text, when it is text.
    pub fn ts_text(&self) -> Option<&str> {
        match &self.ts {
            Some(TimestampField::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Outcome of normalizing a batch of raw records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    /// Valid observations, ascending by timestamp.
    pub observations: Vec<Observation>,
    /// Records dropped as malformed.
    pub skipped: usize,
    /// Records dropped because they belong to another venue.
    pub other_venue: usize,
}

/// Validate a batch of raw records.
///
/// Records carrying a venue different from `venue` are dropped; records
/// without a venue are kept. The output is sorted by timestamp (stable).
pub fn normalize_records(records: &[RawRecord], venue: Option<&str>) -> Normalized {
    let mut out = Normalized::default();

    for raw in records {
        if let (Some(wanted), Some(found)) = (venue, raw.venue()) {
            if wanted != found {
                out.other_venue += 1;
                continue;
            }
        }
        match Observation::from_raw(raw) {
            Ok(obs) => out.observations.push(obs),
            Err(reason) => {
                debug!("occupancy.normalize.skip reason={}", reason);
                out.skipped += 1;
            }
        }
    }

    out.observations.sort_by_key(|o| o.ts);
    debug!(
        "occupancy.normalize.done kept={} skipped={} other_venue={}",
        out.observations.len(),
        out.skipped,
        out.other_venue
    );
    out
}
