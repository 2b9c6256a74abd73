use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%b %d, %Y %I:%M:%S %p",
    "%b %d %Y %H:%M:%S",
];

/// Parse a wall-clock timestamp in any of the layouts seen in vendor exports.
///
/// Values with an explicit offset are normalised to UTC before the offset is
/// dropped, so callers should only feed UTC columns through here when an
/// offset may be present.
pub fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim().trim_end_matches(" UTC").trim_end_matches('Z');
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    // Date-only values are taken as midnight
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%m/%d/%Y"))
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a timestamp known to be UTC
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    parse_naive(value).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Wall-clock time in `tz` for a UTC instant (DST aware)
pub fn to_local(utc: DateTime<Utc>, tz: Tz) -> NaiveDateTime {
    utc.with_timezone(&tz).naive_local()
}

/// Floor a timestamp to a multiple of `minutes` counted from the Unix epoch
pub fn floor_to_minutes(dt: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let step = i64::from(minutes.max(1)) * 60;
    let secs = dt.and_utc().timestamp();
    let floored = secs - secs.rem_euclid(step);
    DateTime::from_timestamp(floored, 0)
        .map(|d| d.naive_utc())
        .unwrap_or(dt)
}
