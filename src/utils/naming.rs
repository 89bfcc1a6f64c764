use crate::error::{MetadataError, Result};
use crate::utils::constants::{ALT_PATH_SEPARATOR, LEGACY_TYPE_SUFFIXES, PATH_SEPARATOR};

/// Normalize an attribute name from a standards table.
///
/// `/` becomes `.`, CamelCase becomes snake_case, and the name must start
/// with a letter.
///
/// # Examples
/// ```
/// use mth5_metadata::utils::naming::normalize_attribute_name;
///
/// assert_eq!(normalize_attribute_name("location/Latitude").unwrap(), "location.latitude");
/// assert_eq!(normalize_attribute_name("timePeriod.startDate").unwrap(), "time_period.start_date");
/// ```
pub fn normalize_attribute_name(name: &str) -> Result<String> {
    let name = normalize_path(name.trim());

    let mut normalized = String::with_capacity(name.len() + 4);
    let mut previous: Option<char> = None;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if let Some(p) = previous {
                if p != PATH_SEPARATOR && p != '_' {
                    normalized.push('_');
                }
            }
            normalized.push(c.to_ascii_lowercase());
        } else {
            normalized.push(c);
        }
        previous = Some(c);
    }

    if normalized.is_empty() {
        return Err(MetadataError::InvalidFormat(
            "Attribute name cannot be empty".to_string(),
        ));
    }

    for segment in normalized.split(PATH_SEPARATOR) {
        match segment.chars().next() {
            None => {
                return Err(MetadataError::InvalidFormat(format!(
                    "Attribute name has an empty segment: '{}'",
                    normalized
                )))
            }
            Some(c) if c.is_ascii_digit() => {
                return Err(MetadataError::InvalidFormat(format!(
                    "Attribute name cannot start with a number: '{}'",
                    normalized
                )))
            }
            Some(_) => {}
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(MetadataError::InvalidFormat(format!(
                "Attribute name must be lower case letters, digits and '_': '{}'",
                normalized
            )));
        }
    }

    Ok(normalized)
}

/// Replace the alternate `/` separator with `.`; input keys are otherwise kept as written.
pub fn normalize_path(path: &str) -> String {
    path.replace(ALT_PATH_SEPARATOR, &PATH_SEPARATOR.to_string())
}

/// Remove a legacy `_s`/`_d`/`_i`/`_b`/`_l` type suffix from every segment of a path.
pub fn strip_type_suffixes(path: &str) -> String {
    path.split(PATH_SEPARATOR)
        .map(strip_segment_suffix)
        .collect::<Vec<_>>()
        .join(".")
}

fn strip_segment_suffix(segment: &str) -> &str {
    for suffix in LEGACY_TYPE_SUFFIXES {
        if let Some(stripped) = segment.strip_suffix(suffix) {
            if !stripped.is_empty() {
                return stripped;
            }
        }
    }
    segment
}

/// True when any segment of the path carries a legacy type suffix.
pub fn has_type_suffix(path: &str) -> bool {
    path.split(PATH_SEPARATOR)
        .any(|segment| strip_segment_suffix(segment).len() != segment.len())
}

/// Parent namespace of a dotted path (`location.declination.value` -> `location.declination`).
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(PATH_SEPARATOR).map(|(parent, _)| parent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_attribute_name() {
        assert_eq!(normalize_attribute_name("archive_id").unwrap(), "archive_id");
        assert_eq!(
            normalize_attribute_name("provenance/software/Name").unwrap(),
            "provenance.software.name"
        );
        assert_eq!(normalize_attribute_name("sampleRate").unwrap(), "sample_rate");
        assert!(normalize_attribute_name("0test").is_err());
        assert!(normalize_attribute_name("location..latitude").is_err());
        assert!(normalize_attribute_name("bad-name").is_err());
    }

    #[test]
    fn test_strip_type_suffixes() {
        assert_eq!(
            strip_type_suffixes("battery.start_voltage_d"),
            "battery.start_voltage"
        );
        assert_eq!(strip_type_suffixes("sta_code_s"), "sta_code");
        assert_eq!(strip_type_suffixes("filter.applied_b"), "filter.applied");
        assert_eq!(strip_type_suffixes("archive_id"), "archive_id");
        assert_eq!(strip_type_suffixes("_s"), "_s");
    }

    #[test]
    fn test_has_type_suffix() {
        assert!(has_type_suffix("location.latitude_d"));
        assert!(!has_type_suffix("location.latitude"));
        assert!(!has_type_suffix("n_channels"));
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("location.declination.value"), Some("location.declination"));
        assert_eq!(parent_path("id"), None);
    }
}
