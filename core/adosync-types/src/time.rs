//! Timestamp helpers.
//!
//! All persisted times are signed 64-bit milliseconds since the Unix epoch,
//! UTC. `time_updated` columns are the sole basis for staleness decisions.

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the Unix epoch, UTC.
pub type Millis = i64;

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Convert a stored millisecond timestamp back to a UTC datetime.
///
/// Out-of-range values clamp to the epoch rather than panicking; they can
/// only appear if the database was edited by hand.
pub fn from_millis(millis: Millis) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

/// Convert a UTC datetime to stored milliseconds.
pub fn to_millis(dt: DateTime<Utc>) -> Millis {
    dt.timestamp_millis()
}
