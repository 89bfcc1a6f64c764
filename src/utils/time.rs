use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::{MetadataError, Result};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp string into UTC.
///
/// Accepts RFC 3339 (any offset, converted to UTC), naive date-times which are
/// taken to be UTC, and bare dates which mean midnight UTC.
///
/// # Examples
/// ```
/// use mth5_metadata::utils::time::{parse_timestamp, format_timestamp};
///
/// let t = parse_timestamp("2020-01-01T12:00:00-07:00").unwrap();
/// assert_eq!(format_timestamp(&t), "2020-01-01T19:00:00+00:00");
/// ```
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(MetadataError::InvalidFormat(format!(
        "Invalid timestamp: '{}'",
        value
    )))
}

/// Interpret epoch seconds (UTC) as a timestamp.
pub fn from_epoch_seconds(seconds: f64) -> Result<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(MetadataError::InvalidFormat(format!(
            "Invalid epoch seconds: {}",
            seconds
        )));
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round() as u32;

    Utc.timestamp_opt(whole as i64, nanos.min(999_999_999))
        .single()
        .ok_or_else(|| {
            MetadataError::InvalidFormat(format!("Epoch seconds out of range: {}", seconds))
        })
}

/// ISO-8601 with an explicit `+00:00` offset; fractional seconds only when non-zero.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339_converts_to_utc() {
        let dt = parse_timestamp("2020-06-01T08:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&dt), "2020-06-01T06:30:00+00:00");
    }

    #[test]
    fn test_parse_naive_and_date_only() {
        let dt = parse_timestamp("1980-01-01 00:00:00").unwrap();
        assert_eq!(format_timestamp(&dt), "1980-01-01T00:00:00+00:00");

        let dt = parse_timestamp("2021-03-04").unwrap();
        assert_eq!(format_timestamp(&dt), "2021-03-04T00:00:00+00:00");

        let dt = parse_timestamp("2021-03-04T10:11:12.500").unwrap();
        assert_eq!(format_timestamp(&dt), "2021-03-04T10:11:12.500+00:00");
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("2021-13-40").is_err());
    }

    #[test]
    fn test_epoch_seconds() {
        let dt = from_epoch_seconds(315532800.0).unwrap();
        assert_eq!(format_timestamp(&dt), "1980-01-01T00:00:00+00:00");
        assert!(from_epoch_seconds(f64::NAN).is_err());
    }

    #[test]
    fn test_format_is_reparseable() {
        let dt = parse_timestamp("2019-11-05T23:59:59.25Z").unwrap();
        assert_eq!(parse_timestamp(&format_timestamp(&dt)).unwrap(), dt);
    }
}
