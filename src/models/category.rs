use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MetadataError, Result};

/// Metadata container categories known to the schema registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Survey,
    Station,
    Run,
    DataLogger,
    Electric,
    Magnetic,
    Auxiliary,
    Filter,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Survey,
        Category::Station,
        Category::Run,
        Category::DataLogger,
        Category::Electric,
        Category::Magnetic,
        Category::Auxiliary,
        Category::Filter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Survey => "survey",
            Category::Station => "station",
            Category::Run => "run",
            Category::DataLogger => "data_logger",
            Category::Electric => "electric",
            Category::Magnetic => "magnetic",
            Category::Auxiliary => "auxiliary",
            Category::Filter => "filter",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "survey" => Some(Category::Survey),
            "station" => Some(Category::Station),
            "run" => Some(Category::Run),
            "data_logger" | "datalogger" => Some(Category::DataLogger),
            "electric" => Some(Category::Electric),
            "magnetic" => Some(Category::Magnetic),
            "auxiliary" => Some(Category::Auxiliary),
            "filter" => Some(Category::Filter),
            _ => None,
        }
    }

    pub fn is_channel(&self) -> bool {
        matches!(
            self,
            Category::Electric | Category::Magnetic | Category::Auxiliary
        )
    }

    /// Field that names an instance of this category inside its parent.
    pub fn identifier_field(&self) -> &'static str {
        match self {
            Category::Survey => "id",
            Category::Station => "archive_id",
            Category::Run => "id",
            Category::DataLogger => "id",
            Category::Electric | Category::Magnetic | Category::Auxiliary => "component",
            Category::Filter => "name",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self> {
        Category::parse(s)
            .ok_or_else(|| MetadataError::InvalidFormat(format!("Unknown category: '{}'", s)))
    }
}
