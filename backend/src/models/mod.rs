pub mod observation;
pub mod time;

pub use observation::{
    normalize_records, CountField, MalformedRecord, Normalized, Observation, RawRecord,
    TimestampField, VenueField,
};
pub use time::{
    floor_to_bucket, offset_from_minutes, Clock, FixedClock, NightWindow, SystemClock,
    BUCKET_MINUTES,
};
