//! Provider timestamp normalization.
//!
//! Postmark reports instants as local ISO datetimes with a seven digit
//! fraction and an offset that is always introduced by a literal `+`, e.g.
//! `2011-05-23T07:38:26.3115+01:00` or `2011-05-23T07:38:26.3115+-04:00`.
//! The sign of the offset lives on the hour component.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// `strftime` layout of the local part of a provider timestamp.
const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Width of `YYYY-MM-DDTHH:MM:SS.ffffff`. Longer fractions are cut here.
const LOCAL_WIDTH: usize = 26;

/// A provider timestamp that could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed provider timestamp: {0:?}")]
pub struct MalformedTimestamp(pub String);

/// Parse a provider timestamp into an absolute UTC instant.
pub fn parse_provider_timestamp(raw: &str) -> Result<DateTime<Utc>, MalformedTimestamp> {
    let malformed = || MalformedTimestamp(raw.to_string());

    let (local, offset) = raw.trim().rsplit_once('+').ok_or_else(malformed)?;
    let (hours, minutes) = offset.split_once(':').ok_or_else(malformed)?;

    let hours = hours.trim();
    let negative = hours.starts_with('-');
    let hours: i32 = hours.parse().map_err(|_| malformed())?;
    let minutes: i32 = minutes.trim().parse().map_err(|_| malformed())?;
    if !(0..60).contains(&minutes) {
        return Err(malformed());
    }

    let magnitude = hours.abs() * 3600 + minutes * 60;
    let seconds = if negative { -magnitude } else { magnitude };
    let zone = FixedOffset::east_opt(seconds).ok_or_else(malformed)?;

    let local = local.get(..LOCAL_WIDTH).unwrap_or(local);
    let naive = NaiveDateTime::parse_from_str(local, LOCAL_FORMAT).map_err(|_| malformed())?;

    let instant = zone
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(malformed)?;

    Ok(instant.with_timezone(&Utc))
}

/// Render a UTC instant in the provider's wire shape.
pub fn format_provider_timestamp(instant: DateTime<Utc>) -> String {
    format!("{}+00:00", instant.format("%Y-%m-%dT%H:%M:%S%.6f"))
}
