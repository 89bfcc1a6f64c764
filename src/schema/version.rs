use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MetadataError, Result};
use crate::utils::constants::{
    CURRENT_SCHEMA_VERSION, LEGACY_LAYOUT_SCHEMA_VERSION, SUFFIXED_SCHEMA_VERSION,
};

/// `major.minor.patch` tag of a metadata schema revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        parse_constant(CURRENT_SCHEMA_VERSION)
    }

    /// Flat keys with `_s`/`_d`/`_i`/`_b` type suffixes.
    pub fn suffixed() -> Self {
        parse_constant(SUFFIXED_SCHEMA_VERSION)
    }

    /// Suffix-free keys with the pre-`time_period` layout.
    pub fn legacy_layout() -> Self {
        parse_constant(LEGACY_LAYOUT_SCHEMA_VERSION)
    }

    pub fn is_current(&self) -> bool {
        *self == Self::current()
    }
}

fn parse_constant(s: &str) -> SchemaVersion {
    s.parse().unwrap_or(SchemaVersion::new(0, 0, 0))
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = MetadataError;

    /// Accepts `0.3`, `0.3.0` and `v0.3.0`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches(['v', 'V']);
        let parts: Vec<&str> = trimmed.split('.').collect();

        if parts.is_empty() || parts.len() > 3 {
            return Err(MetadataError::InvalidFormat(format!(
                "Invalid schema version: '{}'",
                s
            )));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse::<u32>().map_err(|_| {
                MetadataError::InvalidFormat(format!("Invalid schema version: '{}'", s))
            })?;
        }

        Ok(SchemaVersion::new(numbers[0], numbers[1], numbers[2]))
    }
}

/// Half-open version range `[from, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange {
    pub from: SchemaVersion,
    pub until: SchemaVersion,
}

impl VersionRange {
    pub const fn new(from: SchemaVersion, until: SchemaVersion) -> Self {
        Self { from, until }
    }

    pub fn contains(&self, version: &SchemaVersion) -> bool {
        *version >= self.from && *version < self.until
    }
}
