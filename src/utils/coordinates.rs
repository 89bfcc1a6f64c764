use crate::error::{MetadataError, Result};
use crate::utils::constants::{LATITUDE_BOUNDS, LONGITUDE_BOUNDS};

/// Convert DMS (Degrees:Minutes:Seconds) format to decimal degrees
///
/// # Examples
/// ```
/// use mth5_metadata::utils::coordinates::dms_to_decimal;
///
/// let decimal = dms_to_decimal("50:30:15").unwrap();
/// assert!((decimal - 50.504167).abs() < 0.000001);
/// ```
pub fn dms_to_decimal(dms: &str) -> Result<f64> {
    let parts: Vec<&str> = dms.trim().split(':').collect();

    if parts.len() != 3 {
        return Err(MetadataError::InvalidCoordinate(format!(
            "Invalid DMS format: '{}'. Expected format: 'DD:MM:SS'",
            dms
        )));
    }

    // The sign can only ride on the degrees field, "-0:07:39" included
    let is_negative = dms.trim_start().starts_with('-');

    let degrees = parts[0].trim().parse::<f64>().map_err(|_| {
        MetadataError::InvalidCoordinate(format!("Invalid degrees value: '{}'", parts[0]))
    })?;

    let minutes = parts[1].trim().parse::<f64>().map_err(|_| {
        MetadataError::InvalidCoordinate(format!("Invalid minutes value: '{}'", parts[1]))
    })?;

    let seconds = parts[2].trim().parse::<f64>().map_err(|_| {
        MetadataError::InvalidCoordinate(format!("Invalid seconds value: '{}'", parts[2]))
    })?;

    if !(0.0..60.0).contains(&minutes) {
        return Err(MetadataError::InvalidCoordinate(format!(
            "Minutes must be between 0 and 60, got: {}",
            minutes
        )));
    }

    if !(0.0..60.0).contains(&seconds) {
        return Err(MetadataError::InvalidCoordinate(format!(
            "Seconds must be between 0 and 60, got: {}",
            seconds
        )));
    }

    let decimal_value = degrees.abs() + minutes / 60.0 + seconds / 3600.0;

    if is_negative {
        Ok(-decimal_value)
    } else {
        Ok(decimal_value)
    }
}

/// Convert decimal degrees to DMS format
pub fn decimal_to_dms(decimal: f64) -> String {
    let sign = if decimal < 0.0 { "-" } else { "" };
    let abs_decimal = decimal.abs();

    let mut degrees = abs_decimal.floor() as i32;
    let minutes_decimal = (abs_decimal - degrees as f64) * 60.0;
    let mut minutes = minutes_decimal.floor() as i32;
    let mut seconds = ((minutes_decimal - minutes as f64) * 60.0 * 100.0).round() / 100.0;

    // rounding can carry 59.999 up into the next minute
    if seconds >= 60.0 {
        seconds = 0.0;
        minutes += 1;
    }
    if minutes == 60 {
        minutes = 0;
        degrees += 1;
    }

    format!("{}{}:{:02}:{:05.2}", sign, degrees, minutes, seconds)
}

/// Parse coordinate that might be in DMS or decimal format
pub fn parse_coordinate(coord_str: &str) -> Result<f64> {
    let trimmed = coord_str.trim();

    if !trimmed.contains(':') {
        trimmed.parse::<f64>().map_err(|_| {
            MetadataError::InvalidCoordinate(format!("Invalid coordinate value: '{}'", coord_str))
        })
    } else {
        dms_to_decimal(trimmed)
    }
}

/// Inclusive bounds for a coordinate attribute, keyed on the last path segment.
pub fn coordinate_bounds(path: &str) -> Option<(f64, f64)> {
    match path.rsplit('.').next() {
        Some("latitude") => Some(LATITUDE_BOUNDS),
        Some("longitude") => Some(LONGITUDE_BOUNDS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dms_to_decimal() {
        assert!((dms_to_decimal("50:30:15").unwrap() - 50.504167).abs() < 0.000001);
        assert!((dms_to_decimal("51:28:38").unwrap() - 51.477222).abs() < 0.000001);

        // -0:07:39 = -(7/60 + 39/3600)
        let result = dms_to_decimal("-0:07:39").unwrap();
        assert!((result - -0.1275).abs() < 0.0001);
    }

    #[test]
    fn test_invalid_dms_format() {
        assert!(dms_to_decimal("50:30").is_err());
        assert!(dms_to_decimal("50:70:15").is_err());
        assert!(dms_to_decimal("50:30:70").is_err());
    }

    #[test]
    fn test_decimal_to_dms() {
        assert_eq!(decimal_to_dms(50.504167), "50:30:15.00");
        assert_eq!(decimal_to_dms(-0.1275), "-0:07:39.00");
        assert_eq!(decimal_to_dms(39.9999999), "40:00:00.00");
    }

    #[test]
    fn test_parse_coordinate() {
        assert!((parse_coordinate("40.5074").unwrap() - 40.5074).abs() < 0.000001);
        assert!((parse_coordinate("-116:30:00").unwrap() - -116.5).abs() < 0.000001);
        assert!(parse_coordinate("north").is_err());
    }

    #[test]
    fn test_coordinate_bounds() {
        assert_eq!(coordinate_bounds("location.latitude"), Some((-90.0, 90.0)));
        assert_eq!(coordinate_bounds("longitude"), Some((-180.0, 180.0)));
        assert_eq!(coordinate_bounds("location.elevation"), None);
    }
}
