use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Which level of the tree a summary row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryLevel {
    Station,
    Run,
    Channel,
}

impl SummaryLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryLevel::Station => "station",
            SummaryLevel::Run => "run",
            SummaryLevel::Channel => "channel",
        }
    }
}

impl fmt::Display for SummaryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flattened listing row for stations, runs and channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SummaryRow {
    pub level: SummaryLevel,

    /// Structural path, e.g. `station/MT001/run/MT001a`.
    #[validate(length(min = 1))]
    pub path: String,

    #[validate(length(min = 1))]
    pub identifier: String,

    pub start: Option<String>,
    pub end: Option<String>,

    /// Comma separated component list.
    pub components: String,

    pub measurement_type: Option<String>,

    #[validate(range(min = 0.0))]
    pub sample_rate: Option<f64>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    pub elevation: Option<f64>,

    pub units: Option<String>,
}

impl SummaryRow {
    pub fn new(level: SummaryLevel, path: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            level,
            path: path.into(),
            identifier: identifier.into(),
            start: None,
            end: None,
            components: String::new(),
            measurement_type: None,
            sample_rate: None,
            latitude: None,
            longitude: None,
            elevation: None,
            units: None,
        }
    }

    pub fn with_period(mut self, start: Option<String>, end: Option<String>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_components(mut self, components: &[String]) -> Self {
        self.components = components.join(",");
        self
    }

    pub fn with_measurement_type(mut self, measurement_type: Option<String>) -> Self {
        self.measurement_type = measurement_type;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: Option<f64>) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_location(
        mut self,
        latitude: Option<f64>,
        longitude: Option<f64>,
        elevation: Option<f64>,
    ) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self.elevation = elevation;
        self
    }

    pub fn with_units(mut self, units: Option<String>) -> Self {
        self.units = units;
        self
    }

    pub fn component_list(&self) -> Vec<&str> {
        self.components
            .split(',')
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_row_validation() {
        let row = SummaryRow::new(SummaryLevel::Station, "station/MT001", "MT001")
            .with_location(Some(40.0), Some(-116.0), Some(1200.0))
            .with_components(&["Ex".to_string(), "Hy".to_string()]);
        assert!(row.validate().is_ok());
        assert_eq!(row.component_list(), vec!["Ex", "Hy"]);

        let bad = row.clone().with_location(Some(95.0), Some(-116.0), None);
        assert!(bad.validate().is_err());

        let unnamed = SummaryRow::new(SummaryLevel::Run, "station/MT001/run/", "");
        assert!(unnamed.validate().is_err());
    }
}
